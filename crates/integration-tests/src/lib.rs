//! Integration tests for the Stitch storefront API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stitch-integration-tests
//! ```
//!
//! Each test builds a [`TestContext`]: the full router (`stitch_storefront::app`)
//! over a fresh in-memory store, served on an ephemeral local port and driven
//! with a `reqwest` client. No database is needed.
//!
//! # Test Files
//!
//! - `auth` - registration, tokens, logout
//! - `shopping` - catalog, cart, checkout and order flows
//! - `ownership` - cross-account access and staff-only routes

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};

use stitch_storefront::config::{AuthConfig, LogFormat, PaginationConfig, StorefrontConfig};
use stitch_storefront::db::MemoryStore;
use stitch_storefront::state::AppState;

/// Password used for every account created by the helpers.
pub const PASSWORD: &str = "thimble-and-thread";

/// A running storefront plus a client pointed at it.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub state: AppState,
}

/// Tokens and id of a signed-in account.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: i64,
    pub access: String,
    pub refresh: String,
}

/// Status and JSON body of a response. Empty bodies read as `null`.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

fn test_config(addr: SocketAddr) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused/stitch"),
        host: addr.ip(),
        port: addr.port(),
        base_url: format!("http://{addr}"),
        auth: AuthConfig {
            jwt_secret: SecretString::from("k7Gp2xQw9Lm4Zr8Tv1Hs6Bn3Yc5Df0Ja"),
            access_token_ttl: Duration::from_secs(900),
            refresh_token_ttl: Duration::from_secs(604_800),
        },
        pagination: PaginationConfig::default(),
        cors_origins: Vec::new(),
        log_format: LogFormat::Pretty,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

impl TestContext {
    /// Serve a fresh app on `127.0.0.1:0`.
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let state = AppState::new(test_config(addr), Arc::new(MemoryStore::new()));
        let app = stitch_storefront::app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server error");
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Absolute URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request, optionally as `session`, with an optional JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
        body: Option<Value>,
    ) -> Reply {
        let mut request = self.client.request(method, self.url(path));
        if let Some(session) = session {
            request = request.bearer_auth(&session.access);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.expect("Request failed");
        let status = response.status();
        let text = response.text().await.expect("Failed to read body");
        let body = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Reply { status, body }
    }

    pub async fn get(&self, path: &str, session: Option<&Session>) -> Reply {
        self.send(Method::GET, path, session, None).await
    }

    pub async fn post(&self, path: &str, session: Option<&Session>, body: Value) -> Reply {
        self.send(Method::POST, path, session, Some(body)).await
    }

    pub async fn patch(&self, path: &str, session: Option<&Session>, body: Value) -> Reply {
        self.send(Method::PATCH, path, session, Some(body)).await
    }

    pub async fn delete(&self, path: &str, session: Option<&Session>) -> Reply {
        self.send(Method::DELETE, path, session, None).await
    }

    /// Log in with [`PASSWORD`].
    pub async fn login(&self, username: &str) -> Session {
        let reply = self
            .post(
                "/api/auth/token/",
                None,
                json!({"username": username, "password": PASSWORD}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "login failed: {:?}", reply.body);

        Session {
            id: reply.body["user"]["id"].as_i64().expect("user id"),
            access: reply.body["access"].as_str().expect("access").to_owned(),
            refresh: reply.body["refresh"].as_str().expect("refresh").to_owned(),
        }
    }

    /// Register a customer through the API and log in.
    pub async fn customer(&self, username: &str) -> Session {
        let reply = self
            .post(
                "/api/auth/register/",
                None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                    "first_name": username,
                }),
            )
            .await;
        assert_eq!(
            reply.status,
            StatusCode::CREATED,
            "register failed: {:?}",
            reply.body
        );
        self.login(username).await
    }

    /// Create a staff account directly and log in.
    pub async fn staff(&self, username: &str) -> Session {
        self.state
            .accounts()
            .create_staff(username, &format!("{username}@example.com"), PASSWORD)
            .await
            .expect("Failed to create staff account");
        self.login(username).await
    }

    /// Create a category as `staff`.
    pub async fn category(&self, staff: &Session, name: &str, parent: Option<i64>) -> Value {
        let reply = self
            .post(
                "/api/categories/",
                Some(staff),
                json!({"name": name, "parent_category": parent}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.body
    }

    /// Create an available product with 10 in stock as `staff`.
    pub async fn product(
        &self,
        staff: &Session,
        name: &str,
        price: &str,
        category: Option<i64>,
    ) -> Value {
        let reply = self
            .post(
                "/api/products/",
                Some(staff),
                json!({
                    "name": name,
                    "price": price,
                    "stock_quantity": 10,
                    "category": category,
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.body
    }

    /// Save a shipping address for `session`.
    pub async fn address(&self, session: &Session) -> Value {
        let reply = self
            .post(
                "/api/addresses/",
                Some(session),
                json!({
                    "street_name": "12 Rizal Avenue",
                    "barangay": "San Antonio",
                    "city_municipality": "Makati",
                    "province": "Metro Manila",
                    "postal_code": "1203",
                    "country": "Philippines",
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
        reply.body
    }
}

/// Read a JSON id field.
#[must_use]
pub fn id(value: &Value, field: &str) -> i64 {
    value[field]
        .as_i64()
        .unwrap_or_else(|| panic!("missing {field} in {value}"))
}

/// Read a money field as a decimal, so `"20.00"` and `"20.0"` compare equal.
#[must_use]
pub fn money(value: &Value) -> Decimal {
    let text = value
        .as_str()
        .unwrap_or_else(|| panic!("expected a money string, got {value}"));
    Decimal::from_str(text).unwrap_or_else(|e| panic!("bad money {text}: {e}"))
}
