//! HTTP handlers, grouped by resource.

pub mod health;
pub mod notifications;
pub mod rules;
pub mod users;
