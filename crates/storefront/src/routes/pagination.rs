//! Page-number pagination for list routes.
//!
//! Every list route answers with the same envelope:
//!
//! ```json
//! {"count": 42, "next": "http://host/api/products/?page=3", "previous": "...",
//!  "total_pages": 3, "results": [...]}
//! ```
//!
//! `page` is 1-based. `page_size` falls back to the configured default when
//! missing or not a positive integer and is clamped to the configured max.
//! Asking for a page past the end is 404 `Invalid page.`.

use axum::{
    Json,
    extract::{FromRequestParts, OriginalUri, Query},
    http::{Uri, request::Parts},
};
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::AppError;
use crate::models::{Page, PageRequest};
use crate::state::AppState;

/// Query keys owned by the paginator.
#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<String>,
    page_size: Option<String>,
}

/// Response envelope for list routes.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub total_pages: i64,
    pub results: Vec<T>,
}

/// The page a list request asked for, plus what is needed to link its
/// neighbours.
#[derive(Debug, Clone)]
pub struct Pager {
    number: u32,
    size: u32,
    base_url: String,
    uri: Uri,
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

impl Pager {
    fn from_params(
        params: &PageParams,
        config: &PaginationConfig,
        base_url: &str,
        uri: Uri,
    ) -> Result<Self, AppError> {
        let number = match params.page.as_deref() {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(invalid_page)?,
        };
        let size = params
            .page_size
            .as_deref()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|n| *n >= 1)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);

        Ok(Self {
            number,
            size,
            base_url: base_url.to_string(),
            uri,
        })
    }

    /// Window to hand to the store.
    #[must_use]
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.number, self.size)
    }

    /// Wrap one page of results in the envelope.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the requested page is past the last one.
    pub fn respond<T: Serialize>(&self, page: Page<T>) -> Result<Json<Paginated<T>>, AppError> {
        let size = i64::from(self.size);
        // An empty list still has one (empty) page.
        let total_pages = ((page.total.max(1) + size - 1) / size).max(1);
        let number = i64::from(self.number);
        if number > total_pages {
            return Err(invalid_page());
        }

        let next = (number < total_pages).then(|| self.link(Some(self.number + 1)));
        let previous = (number > 1).then(|| {
            // Page 1 is linked without a page parameter.
            let target = self.number - 1;
            self.link((target > 1).then_some(target))
        });

        Ok(Json(Paginated {
            count: page.total,
            next,
            previous,
            total_pages,
            results: page.items,
        }))
    }

    /// Absolute URL of this request with `page` replaced.
    fn link(&self, page: Option<u32>) -> String {
        let mut pairs: Vec<String> = self
            .uri
            .query()
            .unwrap_or_default()
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| pair.split('=').next() != Some("page"))
            .map(str::to_string)
            .collect();
        if let Some(page) = page {
            pairs.push(format!("page={page}"));
        }

        let mut url = format!("{}{}", self.base_url, self.uri.path());
        if !pairs.is_empty() {
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }
}

impl FromRequestParts<AppState> for Pager {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<PageParams>::from_request_parts(parts, state).await?;
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.clone(), |original| original.0.clone());

        let config = state.config();
        Self::from_params(&params, &config.pagination, &config.base_url, uri)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pager(query: &str) -> Result<Pager, AppError> {
        let uri: Uri = format!("/api/products/{query}").parse().unwrap();
        let params: PageParams =
            serde_json::from_value(query_to_json(uri.query().unwrap_or_default())).unwrap();
        Pager::from_params(
            &params,
            &PaginationConfig::default(),
            "http://shop.test",
            uri,
        )
    }

    fn query_to_json(query: &str) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(key, _)| matches!(*key, "page" | "page_size"))
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(value)))
            .collect();
        serde_json::Value::Object(map)
    }

    fn page_of(total: i64) -> Page<i64> {
        Page {
            items: vec![1],
            total,
        }
    }

    #[test]
    fn test_defaults_and_clamping() {
        let default = pager("").unwrap();
        assert_eq!(default.request(), PageRequest::new(1, 20));

        let clamped = pager("?page_size=500").unwrap();
        assert_eq!(clamped.request().limit, 100);

        let junk = pager("?page_size=abc").unwrap();
        assert_eq!(junk.request().limit, 20);
    }

    #[test]
    fn test_invalid_page_numbers() {
        assert!(matches!(pager("?page=0"), Err(AppError::NotFound(_))));
        assert!(matches!(pager("?page=two"), Err(AppError::NotFound(_))));

        let past_end = pager("?page=4&page_size=10").unwrap();
        assert!(matches!(
            past_end.respond(page_of(25)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_links_keep_filters() {
        let middle = pager("?search=denim&page=2&page_size=10").unwrap();
        let Json(envelope) = middle.respond(page_of(25)).unwrap();
        assert_eq!(envelope.count, 25);
        assert_eq!(envelope.total_pages, 3);
        assert_eq!(
            envelope.next.as_deref(),
            Some("http://shop.test/api/products/?search=denim&page_size=10&page=3")
        );
        assert_eq!(
            envelope.previous.as_deref(),
            Some("http://shop.test/api/products/?search=denim&page_size=10")
        );
    }

    #[test]
    fn test_empty_list_is_one_page() {
        let first = pager("").unwrap();
        let Json(envelope) = first.respond(Page::<i64>::empty()).unwrap();
        assert_eq!(envelope.total_pages, 1);
        assert!(envelope.next.is_none());
        assert!(envelope.previous.is_none());
    }
}
