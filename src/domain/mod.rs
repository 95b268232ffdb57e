//! Domain layer containing business entities and logic.
//!
//! This module implements the core domain logic following Clean Architecture principles.
//! It defines entities, repository interfaces, and the long-running pipeline loops,
//! all expressed against traits rather than concrete backends.
//!
//! # Architecture
//!
//! - [`entities`] - Ad and click-row records
//! - [`repositories`] - Data access trait definitions
//! - [`click_event`] - Click submission, validation and broker encoding
//! - [`cache_key`] - Structured aggregate cache keys
//! - [`analytics`] - Stats records and CTR computation
//! - [`sync_state`] - Per-ad cache/store reconciliation state
//! - [`click_worker`] - Broker consumer persisting clicks
//! - [`flush_scheduler`] - Periodic cache-to-store reconciliation
//!
//! # Click Processing Flow
//!
//! 1. HTTP handler validates a [`click_event::ClickSubmission`] into a [`click_event::ClickEvent`]
//! 2. The aggregate cache is updated in the background while the event is published
//! 3. [`click_worker::ClickWorker`] drains the broker with retry logic
//! 4. Click rows and counters are persisted via [`repositories`]
//! 5. [`flush_scheduler::FlushScheduler`] writes cache counters back to the store

pub mod analytics;
pub mod cache_key;
pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod flush_scheduler;
pub mod repositories;
pub mod sync_state;
