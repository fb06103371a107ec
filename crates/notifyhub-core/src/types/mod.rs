//! Shared types used across crates.

pub mod page;

pub use page::Page;
