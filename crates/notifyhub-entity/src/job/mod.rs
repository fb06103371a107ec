//! Background job domain entities.

pub mod model;
pub mod payload;
pub mod status;

pub use model::{Job, NewJob};
pub use status::JobStatus;
