//! Receipt history: date-range queries, summary statistics, text
//! filtering, and pagination.
//!
//! `summarize`, `filter_by_text`, and `paginate` are pure functions over
//! a fetched order list; `HistoryView` strings them together with an
//! explicit "range changed, issue fetch" transition so the flow is
//! testable without a UI harness.

use tracing::info;

use crate::api::OrderService;
use crate::error::CashierError;
use crate::order::{DateRange, Order, SummaryStats};
use crate::paging;

/// Rows per page in the history table.
pub const HISTORY_PAGE_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// Pure aggregation
// ---------------------------------------------------------------------------

/// Single-pass counts and totals partitioned by cleared status. Empty
/// input yields all-zero stats, including a zero (not NaN) average.
pub fn summarize(orders: &[Order]) -> SummaryStats {
    let mut stats = SummaryStats::default();
    for order in orders {
        stats.total_count += 1;
        stats.total_amount += order.amount;
        if order.status.is_cleared() {
            stats.cleared_count += 1;
            stats.cleared_amount += order.amount;
        } else {
            stats.uncleared_count += 1;
            stats.uncleared_amount += order.amount;
        }
    }
    stats.average_amount = stats.total_amount.average_over(stats.total_count);
    stats
}

/// Orders matching a free-text token against the receipt identifier or
/// the customer name (case-insensitive). An empty token is the identity.
pub fn filter_by_text(orders: &[Order], token: &str) -> Vec<Order> {
    if token.trim().is_empty() {
        return orders.to_vec();
    }
    orders
        .iter()
        .filter(|o| o.matches_text(token))
        .cloned()
        .collect()
}

/// Deterministic page slice of `orders`. Callers clamp `page` into
/// `[1, ceil(total / page_size)]`; out-of-range pages come back empty.
pub fn paginate(orders: &[Order], page: usize, page_size: usize) -> Vec<Order> {
    paging::slice_page(orders, page, page_size).to_vec()
}

// ---------------------------------------------------------------------------
// History view
// ---------------------------------------------------------------------------

/// State for the receipt-history screen: the active date range, the
/// fetched orders, and the search/pagination cursors over them.
pub struct HistoryView<S> {
    service: S,
    range: DateRange,
    orders: Vec<Order>,
    search: String,
    page: usize,
}

impl<S: OrderService> HistoryView<S> {
    /// A fresh screen filtered to today. Call [`HistoryView::refresh`]
    /// to run the initial fetch.
    pub fn new(service: S) -> Self {
        Self {
            service,
            range: DateRange::today(),
            orders: Vec::new(),
            search: String::new(),
            page: 1,
        }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Fetch orders for the active range. On failure the previously
    /// fetched orders stay in place.
    pub async fn refresh(&mut self) -> Result<(), CashierError> {
        let orders = self.service.orders_by_range(self.range).await?;
        info!(
            count = orders.len(),
            start = %self.range.start,
            end = %self.range.end,
            "history refreshed"
        );
        self.orders = orders;
        self.page = 1;
        Ok(())
    }

    /// The "filter changed" transition: store the new range, refetch,
    /// reset the page cursor.
    pub async fn set_range(&mut self, range: DateRange) -> Result<(), CashierError> {
        self.range = range;
        self.refresh().await
    }

    /// Update the free-text filter; the cursor returns to the first page.
    pub fn set_search(&mut self, token: &str) {
        self.search = token.trim().to_string();
        self.page = 1;
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Summary statistics over everything fetched for the range (the
    /// text filter does not narrow the stat cards).
    pub fn stats(&self) -> SummaryStats {
        summarize(&self.orders)
    }

    /// Fetched orders with the text filter applied.
    pub fn filtered(&self) -> Vec<Order> {
        filter_by_text(&self.orders, &self.search)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        paging::page_count(self.filtered().len(), HISTORY_PAGE_SIZE)
    }

    /// Move the page cursor, clamped into `[1, page_count]`.
    pub fn set_page(&mut self, page: usize) {
        self.page = paging::clamp_page(page, self.filtered().len(), HISTORY_PAGE_SIZE);
    }

    /// The filtered orders on the current page.
    pub fn page_items(&self) -> Vec<Order> {
        paginate(&self.filtered(), self.page, HISTORY_PAGE_SIZE)
    }
}
