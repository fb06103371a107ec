//! Background job processing for the notification pipeline.
//!
//! This crate provides:
//! - A job executor that dispatches claimed jobs to the correct handler
//! - Per-queue worker runners with bounded per-job-type concurrency
//! - A recurring-task scheduler that computes next runs as plain data
//! - The five job handlers: push-fanout, batch-ingest, send-email,
//!   digest-build, sweep-archived

pub mod executor;
pub mod jobs;
pub mod runner;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use runner::{Lane, WorkerRunner};
pub use scheduler::{RecurringScheduler, RecurringTask, Schedule};
