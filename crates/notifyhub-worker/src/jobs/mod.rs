//! Job handler implementations.

pub mod batch;
pub mod cleanup;
pub mod digest;
pub mod email;
pub mod fanout;

pub use batch::BatchIngestHandler;
pub use cleanup::SweepArchivedHandler;
pub use digest::DigestBuildHandler;
pub use email::SendEmailHandler;
pub use fanout::PushFanoutHandler;
