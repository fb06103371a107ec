//! User domain entity (consumed, not owned, by the pipeline).

pub mod model;

pub use model::User;
