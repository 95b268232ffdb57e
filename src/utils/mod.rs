//! Utility functions shared across layers.
//!
//! - [`deadline`] - Upper bounds for store operations

pub mod deadline;
