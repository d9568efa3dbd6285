//! Remote order service client.
//!
//! Authenticated HTTP/JSON communication with the POS dashboard: the
//! posted-orders feed, batch bill clearing, date-range history queries,
//! login, and password changes. The `OrderService` trait is the seam the
//! reconciliation and history screens depend on, so they can be driven
//! by an in-memory fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{status_error, transport_error, CashierError};
use crate::money::Money;
use crate::order::{DateRange, Order, OrderId, PaymentSplit};
use crate::session::{Session, SessionStore};

/// Default timeout for order service requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum length the dashboard accepts for a new password.
const MIN_PASSWORD_LEN: usize = 6;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the order service, passed explicitly into the
/// client constructor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Normalise the order service URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /api
    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Every list endpoint wraps its payload in `{ "data": ... }`.
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Serialize)]
struct ClearBillRequest {
    cash: Money,
    mpesa: Money,
    bill_ids: Vec<OrderId>,
}

#[derive(Serialize)]
struct RangeRequest {
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    user_id: i64,
    #[serde(rename = "currentPassword")]
    current_password: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// The remote operations the cashier and history screens depend on.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// List orders awaiting payment clearing.
    async fn posted_orders(&self) -> Result<Vec<Order>, CashierError>;

    /// Mark a batch of orders as paid with the given cash/mobile split.
    async fn clear_bills(
        &self,
        split: PaymentSplit,
        bill_ids: &[OrderId],
    ) -> Result<(), CashierError>;

    /// List orders created within `range`, inclusive both ends.
    async fn orders_by_range(&self, range: DateRange) -> Result<Vec<Order>, CashierError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

/// `OrderService` implementation over HTTP.
pub struct OrderServiceClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl OrderServiceClient {
    /// Build a client, reading the bearer token from the session store.
    /// A missing session is not an error here; authenticated calls fail
    /// with `Auth` before any request is sent.
    pub fn new(config: &ClientConfig, store: &dyn SessionStore) -> Result<Self, CashierError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CashierError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: store.load().map(|s| s.token),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer(&self) -> Result<&str, CashierError> {
        match self.token.as_deref() {
            Some(t) if !t.trim().is_empty() => Ok(t),
            _ => Err(CashierError::Auth(
                "No active session; please log in again".into(),
            )),
        }
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, CashierError> {
        Ok(req.bearer_auth(self.bearer()?))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, CashierError> {
        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, &e))?;
        self.read_json(resp).await
    }

    /// Check the status and decode the body, preserving the server's own
    /// `error`/`message` field when the response is JSON.
    async fn read_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, CashierError> {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(status_error(status, Some(&detail)));
        }

        serde_json::from_str(&body)
            .map_err(|e| CashierError::Network(format!("Invalid JSON from order service: {e}")))
    }

    // -- Supplementary account endpoints ------------------------------------

    /// Authenticate and return the new session. Does not touch the
    /// session store; persisting the result is the shell's call.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, CashierError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(CashierError::Validation(
                "Username and password are required".into(),
            ));
        }

        let req = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { username, password });
        let envelope: DataEnvelope<Session> = self.send(req).await?;
        info!(user = %envelope.data.user.name, "login successful");
        Ok(envelope.data)
    }

    /// Change the signed-in user's password. Local checks first; the
    /// service is not contacted when they fail.
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: &str,
    ) -> Result<(), CashierError> {
        if current.trim().is_empty() {
            return Err(CashierError::Validation(
                "Current password is required".into(),
            ));
        }
        if new.len() < MIN_PASSWORD_LEN {
            return Err(CashierError::Validation(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let req = self
            .authed(self.http.post(self.url("/users/change-password")))?
            .json(&ChangePasswordRequest {
                user_id,
                current_password: current,
                new_password: new,
            });
        let _: Value = self.send(req).await?;
        info!(user_id, "password changed");
        Ok(())
    }
}

#[async_trait]
impl OrderService for OrderServiceClient {
    async fn posted_orders(&self) -> Result<Vec<Order>, CashierError> {
        let req = self.authed(self.http.get(self.url("/posted-orders")))?;
        let envelope: DataEnvelope<Vec<Order>> = self.send(req).await?;
        info!(count = envelope.data.len(), "fetched posted orders");
        Ok(envelope.data)
    }

    async fn clear_bills(
        &self,
        split: PaymentSplit,
        bill_ids: &[OrderId],
    ) -> Result<(), CashierError> {
        let req = self
            .authed(self.http.post(self.url("/clear-bill")))?
            .json(&ClearBillRequest {
                cash: split.cash,
                mpesa: split.mobile,
                bill_ids: bill_ids.to_vec(),
            });
        let _: Value = self.send(req).await?;
        info!(
            count = bill_ids.len(),
            total = %split.total(),
            "cleared bills"
        );
        Ok(())
    }

    async fn orders_by_range(&self, range: DateRange) -> Result<Vec<Order>, CashierError> {
        let req = self
            .authed(self.http.post(self.url("/orders-by-range")))?
            .json(&RangeRequest {
                start_date: range.start,
                end_date: range.end,
            });
        let envelope: DataEnvelope<Vec<Order>> = self.send(req).await?;
        info!(
            count = envelope.data.len(),
            start = %range.start,
            end = %range.end,
            "fetched order history"
        );
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStore, UserAccount};

    fn store_with_token() -> MemorySessionStore {
        MemorySessionStore::with_session(Session {
            token: "tok-abc".into(),
            user: UserAccount {
                id: 1,
                name: "Cashier".into(),
                role: "cashier".into(),
            },
        })
    }

    #[test]
    fn normalizes_base_urls_like_the_dashboard_expects() {
        assert_eq!(
            normalize_base_url("dashboard.example.com"),
            "https://dashboard.example.com"
        );
        assert_eq!(
            normalize_base_url("localhost:3000"),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_base_url("https://pos.example.com/api/"),
            "https://pos.example.com"
        );
        assert_eq!(
            normalize_base_url("  https://pos.example.com///  "),
            "https://pos.example.com"
        );
    }

    #[tokio::test]
    async fn authed_calls_fail_fast_without_a_session() {
        let config = ClientConfig::new("https://pos.example.com");
        let client =
            OrderServiceClient::new(&config, &MemorySessionStore::new()).expect("client");

        let err = client.posted_orders().await.expect_err("no token");
        assert!(matches!(err, CashierError::Auth(_)), "got {err:?}");

        let err = client
            .clear_bills(PaymentSplit::default(), &[1])
            .await
            .expect_err("no token");
        assert!(matches!(err, CashierError::Auth(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn password_change_is_validated_locally_first() {
        let config = ClientConfig::new("https://pos.example.com");
        let client = OrderServiceClient::new(&config, &store_with_token()).expect("client");

        let err = client
            .change_password(1, "", "longenough")
            .await
            .expect_err("missing current password");
        assert!(err.is_validation());

        let err = client
            .change_password(1, "old-pass", "short")
            .await
            .expect_err("short new password");
        assert!(err.is_validation());
    }

    #[test]
    fn clear_bill_body_matches_the_wire_contract() {
        let body = ClearBillRequest {
            cash: Money::from_minor(5000),
            mpesa: Money::ZERO,
            bill_ids: vec![101, 102],
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"cash": 50.0, "mpesa": 0.0, "bill_ids": [101, 102]})
        );
    }
}
