//! Domain model for sales orders (receipts) and their wire shapes.
//!
//! The remote order service spells the same record two ways: the
//! posted-orders feed uses `sales_order_entry_id` / `total_value` /
//! `waiter` / `order_details`, while the history endpoint uses
//! `receipt_number` / `amount` / `customer_name` / `date`. One `Order`
//! struct absorbs both via serde aliases and lenient field parsers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CashierError;
use crate::money::Money;

/// Unique order identifier assigned by the remote service.
pub type OrderId = u64;

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Reconciliation state of an order, as reported by the remote service.
/// Anything the service does not call `Processed` is still awaiting
/// payment clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Posted,
    Processed,
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("processed") {
            OrderStatus::Processed
        } else {
            OrderStatus::Posted
        }
    }
}

impl From<OrderStatus> for String {
    fn from(s: OrderStatus) -> Self {
        match s {
            OrderStatus::Posted => "Posted",
            OrderStatus::Processed => "Processed",
        }
        .to_string()
    }
}

impl OrderStatus {
    /// Whether the order has been cleared (paid out).
    pub fn is_cleared(self) -> bool {
        matches!(self, OrderStatus::Processed)
    }
}

/// A single line on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(alias = "menu_name")]
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "price")]
    pub unit_price: Money,
    #[serde(alias = "total")]
    pub line_total: Money,
}

/// A sales order as fetched from the remote service. Immutable on the
/// client; only the service changes `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(
        alias = "sales_order_entry_id",
        alias = "receipt_number",
        deserialize_with = "de_order_id"
    )]
    pub id: OrderId,
    #[serde(alias = "total_value", alias = "amount")]
    pub amount: Money,
    /// Waiter or customer attribution, depending on the endpoint.
    #[serde(alias = "waiter", alias = "customer_name", default)]
    pub customer: String,
    #[serde(
        alias = "created_at",
        alias = "date",
        deserialize_with = "de_timestamp"
    )]
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    #[serde(alias = "order_details", default)]
    pub items: Vec<LineItem>,
}

impl Order {
    /// Case-insensitive free-text match against the receipt identifier
    /// or the customer/waiter name. An empty token matches everything.
    pub fn matches_text(&self, token: &str) -> bool {
        let token = token.trim();
        if token.is_empty() {
            return true;
        }
        if self.id.to_string().contains(token) {
            return true;
        }
        self.customer.to_lowercase().contains(&token.to_lowercase())
    }
}

/// Identifiers arrive as JSON numbers on the posted feed and as strings
/// on the history feed.
fn de_order_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OrderId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .trim_start_matches('#')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid order id: {s:?}"))),
    }
}

/// Timestamps arrive as RFC 3339, as `YYYY-MM-DD HH:MM:SS`, or as a bare
/// calendar date (history rows). Bare dates become midnight UTC.
fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }
    Err(serde::de::Error::custom(format!(
        "invalid order timestamp: {raw:?}"
    )))
}

// ---------------------------------------------------------------------------
// Payment split
// ---------------------------------------------------------------------------

/// How a clearing submission is paid: cash plus mobile money. Valid only
/// when the two sum exactly to the staged total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub cash: Money,
    pub mobile: Money,
}

impl PaymentSplit {
    pub fn new(cash: Money, mobile: Money) -> Self {
        Self { cash, mobile }
    }

    pub fn total(self) -> Money {
        self.cash + self.mobile
    }
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// An inclusive calendar date range for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CashierError> {
        if start > end {
            return Err(CashierError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Today-to-today, the history screen's initial filter.
    pub fn today() -> Self {
        let today = Utc::now().date_naive();
        Self {
            start: today,
            end: today,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Aggregate counts and totals for a set of orders, partitioned by
/// cleared/uncleared status. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SummaryStats {
    pub total_count: u64,
    pub total_amount: Money,
    pub cleared_count: u64,
    pub cleared_amount: Money,
    pub uncleared_count: u64,
    pub uncleared_amount: Money,
    pub average_amount: Money,
}
