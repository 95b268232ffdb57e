//! Durable-store entities.
//!
//! - [`AdRecord`] - An ad in `metadata_ads`, including its denormalized click counter
//! - [`ClickRow`] - One persisted click in `ads_clicks`
//! - [`FlushPolicy`] / [`ReconcileOutcome`] - How the flush writes counters back

pub mod ad;
pub mod click_row;

pub use ad::{AdRecord, FlushPolicy, ReconcileOutcome};
pub use click_row::ClickRow;
