//! Cashier reconciliation engine.
//!
//! Maintains the two disjoint receipt collections the cashier screen
//! works with — available (posted, awaiting payment) and staged (selected
//! for the next clearing submission) — and drives the clearing flow:
//! search-driven staging, exact running totals, payment-split validation,
//! and the guarded batch submission to the order service. One logical
//! actor mutates this state at a time; the in-flight flag exists to block
//! duplicate destructive submissions, not to serialize reads.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::api::OrderService;
use crate::error::CashierError;
use crate::money::Money;
use crate::order::{Order, OrderId, PaymentSplit};
use crate::paging;

/// Rows per page in the available-receipts pane.
pub const AVAILABLE_PAGE_SIZE: usize = 8;

/// Rows per page in the staged-receipts pane.
pub const STAGED_PAGE_SIZE: usize = 5;

/// How long a search-miss notice stays visible.
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Minimum gap between clearing submissions; a second tap on the submit
/// control inside this window is rejected locally.
const MIN_SUBMIT_INTERVAL: Duration = Duration::from_millis(300);

/// Accumulating loads beyond this count report no further pages.
///
/// The "more available" flag is derived from this fixed counter because
/// the posted-orders endpoint exposes no cursor; loading stops after a
/// fixed number of accumulations regardless of what the server still
/// holds. TODO: derive the flag from a server-side cursor once the
/// endpoint grows one.
const MAX_ACCUMULATED_LOADS: u32 = 2;

/// Transient "receipt not found" notice raised by a failed search.
struct SearchNotice {
    message: String,
    raised_at: Instant,
}

/// State and operations for the cashier reconciliation screen.
pub struct ReconciliationEngine<S> {
    service: S,
    available: Vec<Order>,
    staged: Vec<Order>,
    split: PaymentSplit,
    search: String,
    notice: Option<SearchNotice>,
    submit_in_flight: bool,
    last_submit: Option<Instant>,
    loads: u32,
    has_more: bool,
    available_page: usize,
    staged_page: usize,
}

impl<S: OrderService> ReconciliationEngine<S> {
    /// A fresh screen: empty collections, empty split, page cursors at 1.
    pub fn new(service: S) -> Self {
        Self {
            service,
            available: Vec::new(),
            staged: Vec::new(),
            split: PaymentSplit::default(),
            search: String::new(),
            notice: None,
            submit_in_flight: false,
            last_submit: None,
            loads: 0,
            has_more: true,
            available_page: 1,
            staged_page: 1,
        }
    }

    // -- Loading ------------------------------------------------------------

    /// Fetch posted orders from the service.
    ///
    /// With `append` the results accumulate onto the current collection
    /// and the "more available" flag is recomputed from the fixed load
    /// counter; otherwise the collection is replaced and the flag reset.
    /// On failure the collections are left untouched.
    pub async fn load_available(&mut self, append: bool) -> Result<(), CashierError> {
        let fetched = self.service.posted_orders().await?;

        if append {
            for order in fetched {
                // Skip ids already present in either pane so the
                // available/staged partition survives accumulation.
                if self.knows(order.id) {
                    continue;
                }
                self.available.push(order);
            }
            if self.loads >= MAX_ACCUMULATED_LOADS {
                self.has_more = false;
            }
            self.loads += 1;
        } else {
            let staged_ids: Vec<OrderId> = self.staged.iter().map(|o| o.id).collect();
            self.available = fetched
                .into_iter()
                .filter(|o| !staged_ids.contains(&o.id))
                .collect();
            self.loads = 1;
            self.has_more = true;
        }

        self.clamp_pages();
        Ok(())
    }

    /// Whether another accumulating load is worth offering.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    // -- Staging ------------------------------------------------------------

    /// Move an order from available to staged. No-op if it is already
    /// staged or unknown, so an id never appears twice.
    pub fn stage(&mut self, id: OrderId) {
        if self.staged.iter().any(|o| o.id == id) {
            return;
        }
        if let Some(pos) = self.available.iter().position(|o| o.id == id) {
            let order = self.available.remove(pos);
            self.staged.push(order);
            self.staged_page = 1;
            self.clamp_pages();
        }
    }

    /// Move an order from staged back to available. No-op if absent.
    pub fn unstage(&mut self, id: OrderId) {
        if let Some(pos) = self.staged.iter().position(|o| o.id == id) {
            let order = self.staged.remove(pos);
            self.available.push(order);
            self.clamp_pages();
        }
    }

    /// Stage the order whose identifier exactly matches `token`.
    ///
    /// On a hit the search box is cleared; on a miss a transient notice
    /// is raised (it expires on its own) and nothing else changes.
    pub fn stage_by_search(&mut self, token: &str) -> Result<OrderId, CashierError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CashierError::Validation("No receipt number entered".into()));
        }

        match self
            .available
            .iter()
            .position(|o| o.id.to_string() == token)
        {
            Some(pos) => {
                let id = self.available[pos].id;
                self.stage(id);
                self.search.clear();
                Ok(id)
            }
            None => {
                self.notice = Some(SearchNotice {
                    message: format!("Receipt #{token} not found"),
                    raised_at: Instant::now(),
                });
                Err(CashierError::NotFound(token.to_string()))
            }
        }
    }

    /// The current search-miss notice, if it has not expired yet.
    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| n.raised_at.elapsed() < NOTICE_TTL)
            .map(|n| n.message.as_str())
    }

    // -- Totals and split ---------------------------------------------------

    /// Exact sum of the staged amounts, recomputed from the collection.
    pub fn total(&self) -> Money {
        self.staged.iter().map(|o| o.amount).sum()
    }

    pub fn split(&self) -> PaymentSplit {
        self.split
    }

    pub fn set_split(&mut self, split: PaymentSplit) {
        self.split = split;
    }

    // -- Submission ---------------------------------------------------------

    /// Whether a clearing submission is currently in flight.
    pub fn is_submitting(&self) -> bool {
        self.submit_in_flight
    }

    /// Submit the staged receipts for clearing with the given split.
    ///
    /// All preconditions are checked locally first — an in-flight or
    /// too-recent submission, an empty staging set, or a split that does
    /// not exactly equal the staged total all fail as `Validation`
    /// without contacting the service. On success the staging set and
    /// split are cleared and the available collection is refreshed from
    /// server state.
    pub async fn submit_clearing(&mut self, split: PaymentSplit) -> Result<(), CashierError> {
        if self.submit_in_flight {
            return Err(CashierError::Validation(
                "A clearing submission is already in progress".into(),
            ));
        }
        if let Some(last) = self.last_submit {
            if last.elapsed() < MIN_SUBMIT_INTERVAL {
                return Err(CashierError::Validation(
                    "Submitted too quickly; please wait a moment".into(),
                ));
            }
        }
        if self.staged.is_empty() {
            return Err(CashierError::Validation(
                "No receipts staged for clearing".into(),
            ));
        }

        if split.cash < Money::ZERO || split.mobile < Money::ZERO {
            return Err(CashierError::Validation(
                "Payment amounts cannot be negative".into(),
            ));
        }

        let total = self.total();
        if split.total() != total {
            warn!(
                payment = %split.total(),
                bills = %total,
                "rejected clearing submission: split does not match staged total"
            );
            return Err(CashierError::Validation(format!(
                "Payment total {} does not equal bill total {}",
                split.total(),
                total
            )));
        }

        self.split = split;
        let bill_ids: Vec<OrderId> = self.staged.iter().map(|o| o.id).collect();

        self.submit_in_flight = true;
        self.last_submit = Some(Instant::now());
        let result = self.service.clear_bills(split, &bill_ids).await;
        self.submit_in_flight = false;
        result?;

        info!(count = bill_ids.len(), total = %total, "clearing submitted");
        self.staged.clear();
        self.split = PaymentSplit::default();
        self.staged_page = 1;

        // Server-side status changed; reconcile with authoritative state.
        self.load_available(false).await
    }

    /// Clear the staging set and split locally. Staged receipts reappear
    /// in the available pane on the next refresh.
    pub fn reset(&mut self) {
        self.staged.clear();
        self.split = PaymentSplit::default();
        self.staged_page = 1;
        self.clamp_pages();
    }

    // -- Search and pane views ----------------------------------------------

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Update the search token; the available pane re-filters and its
    /// cursor returns to the first page.
    pub fn set_search(&mut self, token: &str) {
        self.search = token.trim().to_string();
        self.available_page = 1;
    }

    pub fn available(&self) -> &[Order] {
        &self.available
    }

    pub fn staged(&self) -> &[Order] {
        &self.staged
    }

    /// Available orders with the search filter applied (substring match
    /// on the receipt number, like the search box behaves).
    pub fn visible_available(&self) -> Vec<&Order> {
        self.available
            .iter()
            .filter(|o| self.search.is_empty() || o.id.to_string().contains(&self.search))
            .collect()
    }

    pub fn available_page(&self) -> usize {
        self.available_page
    }

    pub fn staged_page(&self) -> usize {
        self.staged_page
    }

    pub fn available_page_count(&self) -> usize {
        paging::page_count(self.visible_available().len(), AVAILABLE_PAGE_SIZE)
    }

    pub fn staged_page_count(&self) -> usize {
        paging::page_count(self.staged.len(), STAGED_PAGE_SIZE)
    }

    /// The slice of filtered available orders on the current page.
    pub fn available_page_items(&self) -> Vec<&Order> {
        let visible = self.visible_available();
        let start = (self.available_page - 1) * AVAILABLE_PAGE_SIZE;
        visible
            .into_iter()
            .skip(start)
            .take(AVAILABLE_PAGE_SIZE)
            .collect()
    }

    /// The slice of staged orders on the current page.
    pub fn staged_page_items(&self) -> &[Order] {
        paging::slice_page(&self.staged, self.staged_page, STAGED_PAGE_SIZE)
    }

    /// Move the available-pane cursor, clamped into the valid range.
    pub fn set_available_page(&mut self, page: usize) {
        self.available_page =
            paging::clamp_page(page, self.visible_available().len(), AVAILABLE_PAGE_SIZE);
    }

    /// Move the staged-pane cursor, clamped into the valid range.
    pub fn set_staged_page(&mut self, page: usize) {
        self.staged_page = paging::clamp_page(page, self.staged.len(), STAGED_PAGE_SIZE);
    }

    // -- Internals ----------------------------------------------------------

    fn knows(&self, id: OrderId) -> bool {
        self.available.iter().any(|o| o.id == id) || self.staged.iter().any(|o| o.id == id)
    }

    /// Re-clamp both cursors after a collection changed size, e.g. after
    /// unstaging the last item on the last page.
    fn clamp_pages(&mut self) {
        self.available_page =
            paging::clamp_page(self.available_page, self.visible_available().len(), AVAILABLE_PAGE_SIZE);
        self.staged_page = paging::clamp_page(self.staged_page, self.staged.len(), STAGED_PAGE_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderStatus;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn order(id: OrderId, minor: i64) -> Order {
        Order {
            id,
            amount: Money::from_minor(minor),
            customer: format!("waiter-{id}"),
            created_at: Utc::now(),
            status: OrderStatus::Posted,
            items: Vec::new(),
        }
    }

    /// In-memory stand-in for the order service. Clearing removes the
    /// cleared ids from the posted feed, like the real server would.
    #[derive(Default)]
    struct FakeService {
        posted: Mutex<Vec<Order>>,
        clear_calls: AtomicUsize,
        cleared: Mutex<Vec<OrderId>>,
        fail_clearing: AtomicBool,
    }

    impl FakeService {
        fn with_posted(orders: Vec<Order>) -> Self {
            Self {
                posted: Mutex::new(orders),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl OrderService for &FakeService {
        async fn posted_orders(&self) -> Result<Vec<Order>, CashierError> {
            Ok(self.posted.lock().expect("posted lock").clone())
        }

        async fn clear_bills(
            &self,
            _split: PaymentSplit,
            bill_ids: &[OrderId],
        ) -> Result<(), CashierError> {
            self.clear_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_clearing.load(Ordering::SeqCst) {
                return Err(CashierError::Network("service unavailable".into()));
            }
            self.cleared
                .lock()
                .expect("cleared lock")
                .extend_from_slice(bill_ids);
            self.posted
                .lock()
                .expect("posted lock")
                .retain(|o| !bill_ids.contains(&o.id));
            Ok(())
        }

        async fn orders_by_range(
            &self,
            _range: crate::order::DateRange,
        ) -> Result<Vec<Order>, CashierError> {
            Ok(Vec::new())
        }
    }

    async fn loaded_engine(service: &FakeService) -> ReconciliationEngine<&FakeService> {
        let mut engine = ReconciliationEngine::new(service);
        engine.load_available(false).await.expect("initial load");
        engine
    }

    #[tokio::test]
    async fn stage_and_unstage_round_trip() {
        let service = FakeService::with_posted(vec![order(101, 5000), order(102, 3000)]);
        let mut engine = loaded_engine(&service).await;

        engine.stage(101);
        assert_eq!(engine.staged().len(), 1);
        assert_eq!(engine.available().len(), 1);
        // The partition invariant: never in both panes.
        assert!(!engine.available().iter().any(|o| o.id == 101));

        engine.unstage(101);
        assert_eq!(engine.staged().len(), 0);
        assert_eq!(engine.available().len(), 2);
    }

    #[tokio::test]
    async fn staging_is_idempotent() {
        let service = FakeService::with_posted(vec![order(101, 5000)]);
        let mut engine = loaded_engine(&service).await;

        engine.stage(101);
        engine.stage(101);
        engine.stage(999); // unknown id
        engine.unstage(999); // absent id

        assert_eq!(engine.staged().len(), 1);
        assert!(engine.available().is_empty());
    }

    #[tokio::test]
    async fn total_tracks_the_staged_collection() {
        let service =
            FakeService::with_posted(vec![order(1, 3000), order(2, 2000), order(3, 1500)]);
        let mut engine = loaded_engine(&service).await;

        assert_eq!(engine.total(), Money::ZERO);
        engine.stage(1);
        engine.stage(2);
        assert_eq!(engine.total(), Money::from_minor(5000));
        engine.unstage(1);
        assert_eq!(engine.total(), Money::from_minor(2000));
    }

    #[tokio::test]
    async fn mismatched_split_is_rejected_before_any_network_call() {
        let service = FakeService::with_posted(vec![order(1, 3000), order(2, 2000)]);
        let mut engine = loaded_engine(&service).await;
        engine.stage(1);
        engine.stage(2);

        // 10 + 30 = 40, staged total is 50.
        let split = PaymentSplit::new(Money::from_minor(1000), Money::from_minor(3000));
        let err = engine.submit_clearing(split).await.expect_err("mismatch");
        assert!(err.is_validation());
        assert_eq!(service.clear_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.staged().len(), 2, "staged collection unchanged");
    }

    #[tokio::test]
    async fn empty_staging_set_is_rejected_locally() {
        let service = FakeService::with_posted(vec![order(1, 3000)]);
        let mut engine = loaded_engine(&service).await;

        let err = engine
            .submit_clearing(PaymentSplit::default())
            .await
            .expect_err("nothing staged");
        assert!(err.is_validation());
        assert_eq!(service.clear_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_submission_clears_staging_and_refreshes() {
        let service = FakeService::with_posted(vec![order(101, 5000)]);
        let mut engine = loaded_engine(&service).await;

        engine.stage(101);
        assert!(engine.available().is_empty());

        let split = PaymentSplit::new(Money::from_minor(5000), Money::ZERO);
        engine.submit_clearing(split).await.expect("submit");

        assert!(engine.staged().is_empty());
        assert_eq!(engine.split(), PaymentSplit::default());
        assert!(engine.available().is_empty(), "cleared on the server too");
        assert_eq!(*service.cleared.lock().expect("cleared lock"), vec![101]);
        assert!(!engine.is_submitting());
    }

    #[tokio::test]
    async fn failed_submission_leaves_the_screen_re_enterable() {
        let service = FakeService::with_posted(vec![order(101, 5000)]);
        service.fail_clearing.store(true, Ordering::SeqCst);
        let mut engine = loaded_engine(&service).await;
        engine.stage(101);

        let split = PaymentSplit::new(Money::from_minor(5000), Money::ZERO);
        let err = engine.submit_clearing(split).await.expect_err("fails");
        assert!(matches!(err, CashierError::Network(_)));
        assert_eq!(engine.staged().len(), 1, "staged collection unchanged");
        assert!(!engine.is_submitting(), "in-flight flag cleared");

        // After the minimum interval the same submission goes through.
        service.fail_clearing.store(false, Ordering::SeqCst);
        tokio::time::sleep(MIN_SUBMIT_INTERVAL + Duration::from_millis(50)).await;
        engine.submit_clearing(split).await.expect("retry succeeds");
        assert!(engine.staged().is_empty());
    }

    #[tokio::test]
    async fn rapid_resubmission_is_blocked_by_the_interval_timer() {
        let service = FakeService::with_posted(vec![order(101, 5000), order(102, 4000)]);
        let mut engine = loaded_engine(&service).await;
        engine.stage(101);

        let split = PaymentSplit::new(Money::from_minor(5000), Money::ZERO);
        engine.submit_clearing(split).await.expect("first submit");

        engine.stage(102);
        let split = PaymentSplit::new(Money::from_minor(4000), Money::ZERO);
        let err = engine
            .submit_clearing(split)
            .await
            .expect_err("too soon after the last submission");
        assert!(err.is_validation());
        assert_eq!(service.clear_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn search_staging_hits_and_misses() {
        let service = FakeService::with_posted(vec![order(101, 5000), order(205, 2000)]);
        let mut engine = loaded_engine(&service).await;
        engine.set_search("101");

        let staged = engine.stage_by_search("101").expect("exact match");
        assert_eq!(staged, 101);
        assert_eq!(engine.search(), "", "search box cleared on a hit");
        assert_eq!(engine.staged().len(), 1);

        let err = engine.stage_by_search("777").expect_err("no such receipt");
        assert_eq!(err, CashierError::NotFound("777".into()));
        assert_eq!(engine.notice(), Some("Receipt #777 not found"));
        assert_eq!(engine.staged().len(), 1, "miss mutates nothing");

        // Staged ids no longer match: only available orders are searched.
        let err = engine.stage_by_search("101").expect_err("already staged");
        assert!(matches!(err, CashierError::NotFound(_)));
    }

    #[tokio::test]
    async fn search_miss_notice_expires() {
        let service = FakeService::with_posted(vec![]);
        let mut engine = loaded_engine(&service).await;

        let _ = engine.stage_by_search("1");
        assert!(engine.notice().is_some());

        engine.notice = Some(SearchNotice {
            message: "Receipt #1 not found".into(),
            raised_at: Instant::now() - NOTICE_TTL,
        });
        assert_eq!(engine.notice(), None);
    }

    #[tokio::test]
    async fn refresh_skips_ids_that_are_currently_staged() {
        let service = FakeService::with_posted(vec![order(101, 5000), order(102, 3000)]);
        let mut engine = loaded_engine(&service).await;
        engine.stage(101);

        engine.load_available(false).await.expect("refresh");
        assert_eq!(engine.available().len(), 1);
        assert_eq!(engine.staged().len(), 1);
        assert!(!engine.available().iter().any(|o| o.id == 101));
    }

    #[tokio::test]
    async fn accumulating_loads_exhaust_the_fixed_page_heuristic() {
        let service = FakeService::with_posted(vec![order(1, 100)]);
        let mut engine = loaded_engine(&service).await;
        assert!(engine.has_more());

        engine.load_available(true).await.expect("append 1");
        assert!(engine.has_more());

        engine.load_available(true).await.expect("append 2");
        assert!(!engine.has_more(), "flag derives from the load counter");

        engine.load_available(false).await.expect("replace");
        assert!(engine.has_more(), "replace resets the counter");
    }

    #[tokio::test]
    async fn append_does_not_duplicate_known_orders() {
        let service = FakeService::with_posted(vec![order(1, 100), order(2, 200)]);
        let mut engine = loaded_engine(&service).await;
        engine.stage(1);

        engine.load_available(true).await.expect("append");
        assert_eq!(engine.available().len(), 1);
        assert_eq!(engine.staged().len(), 1);
    }

    #[tokio::test]
    async fn staged_cursor_clamps_when_the_last_page_empties() {
        let orders: Vec<Order> = (1..=6).map(|id| order(id, 1000)).collect();
        let service = FakeService::with_posted(orders);
        let mut engine = loaded_engine(&service).await;

        for id in 1..=6 {
            engine.stage(id);
        }
        assert_eq!(engine.staged_page_count(), 2);
        engine.set_staged_page(2);
        assert_eq!(engine.staged_page_items().len(), 1);

        engine.unstage(6);
        assert_eq!(engine.staged_page(), 1, "cursor clamped after shrink");
    }

    #[tokio::test]
    async fn pane_views_filter_and_paginate() {
        let orders: Vec<Order> = (1..=10).map(|id| order(id, 1000)).collect();
        let service = FakeService::with_posted(orders);
        let mut engine = loaded_engine(&service).await;

        assert_eq!(engine.available_page_count(), 2);
        assert_eq!(engine.available_page_items().len(), AVAILABLE_PAGE_SIZE);
        engine.set_available_page(2);
        assert_eq!(engine.available_page_items().len(), 2);
        engine.set_available_page(99);
        assert_eq!(engine.available_page(), 2, "cursor clamped to last page");

        engine.set_search("1");
        assert_eq!(engine.available_page(), 1, "filter resets the cursor");
        // Matches 1 and 10.
        assert_eq!(engine.visible_available().len(), 2);
    }

    #[tokio::test]
    async fn reset_clears_staging_and_split_without_network() {
        let service = FakeService::with_posted(vec![order(1, 5000), order(2, 2000)]);
        let mut engine = loaded_engine(&service).await;
        engine.stage(1);
        engine.set_split(PaymentSplit::new(Money::from_minor(5000), Money::ZERO));

        engine.reset();
        assert!(engine.staged().is_empty());
        assert_eq!(engine.split(), PaymentSplit::default());
        assert_eq!(service.clear_calls.load(Ordering::SeqCst), 0);
    }
}
