//! Cashier reconciliation and receipt-history client core.
//!
//! A thin, typed client over the restaurant POS dashboard's REST API.
//! The presentation shell (routing, layout, notifications) embeds the
//! two screen state machines exported here: [`ReconciliationEngine`]
//! for clearing posted orders against a cash/mobile-money split, and
//! [`HistoryView`] for browsing receipts by date range with aggregate
//! statistics. All remote access goes through the [`OrderService`]
//! trait; session context is passed in explicitly via [`SessionStore`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod history;
mod money;
mod order;
mod paging;
mod reconcile;
mod session;

pub use api::{ClientConfig, OrderService, OrderServiceClient};
pub use error::CashierError;
pub use history::{
    filter_by_text, paginate, summarize, HistoryView, HISTORY_PAGE_SIZE,
};
pub use money::{InvalidAmount, Money};
pub use order::{
    DateRange, LineItem, Order, OrderId, OrderStatus, PaymentSplit, SummaryStats,
};
pub use reconcile::{ReconciliationEngine, AVAILABLE_PAGE_SIZE, STAGED_PAGE_SIZE};
pub use session::{MemorySessionStore, Session, SessionStore, UserAccount};

/// Install a formatted `tracing` subscriber honouring `RUST_LOG`.
/// Optional; hosts with their own subscriber skip this. Calling it twice
/// is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
