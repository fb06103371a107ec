//! Notification service and its pure scheduling helpers.

pub mod quiet_hours;
pub mod service;
