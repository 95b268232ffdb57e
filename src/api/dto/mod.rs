//! Data Transfer Objects for API responses.
//!
//! The click request body is [`crate::domain::click_event::ClickSubmission`],
//! which carries its own validation rules.

pub mod ads;
pub mod analytics;
pub mod click;
pub mod health;
