//! Limit/offset windows over list results.

/// A window into a filtered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of rows to return.
    pub limit: i64,
    /// Number of rows to skip.
    pub offset: i64,
}

impl PageRequest {
    /// Every row.
    pub const ALL: Self = Self {
        limit: i64::MAX,
        offset: 0,
    };

    /// Window for a 1-based page number.
    #[must_use]
    pub fn new(page: u32, page_size: u32) -> Self {
        let page_size = i64::from(page_size.max(1));
        let page = i64::from(page.max(1));
        Self {
            limit: page_size,
            offset: (page - 1).saturating_mul(page_size),
        }
    }

    /// Cut a fully materialized list down to this window.
    #[must_use]
    pub fn slice<T>(&self, rows: Vec<T>) -> Page<T> {
        let total = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        Page {
            items: rows.into_iter().skip(offset).take(limit).collect(),
            total,
        }
    }
}

/// One window of a list plus the size of the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    /// A page with no rows.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    /// Transform every row, keeping the total.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_offsets() {
        assert_eq!(
            PageRequest::new(1, 20),
            PageRequest {
                limit: 20,
                offset: 0
            }
        );
        assert_eq!(PageRequest::new(3, 10).offset, 20);
        // Page 0 is treated as page 1
        assert_eq!(PageRequest::new(0, 10).offset, 0);
        assert_eq!(PageRequest::new(u32::MAX, u32::MAX).offset, i64::MAX);
    }

    #[test]
    fn test_slice_keeps_total() {
        let page = PageRequest::new(2, 2).slice(vec![1, 2, 3, 4, 5]);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);

        let past_end = PageRequest::new(9, 2).slice(vec![1, 2, 3]);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 3);

        assert_eq!(PageRequest::ALL.slice(vec![1, 2]).items, vec![1, 2]);
    }
}
