//! # notifyhub-core
//!
//! Core crate for NotifyHub. Contains the configuration schemas, the
//! clock abstraction, shared query/page types, and the unified error
//! system used by every other crate.
//!
//! This crate has **no** internal dependencies on other NotifyHub crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::AppError;
pub use result::AppResult;
