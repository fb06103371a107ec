//! # notifyhub-entity
//!
//! Domain entity models for NotifyHub: notifications and their enums,
//! per-user delivery preferences, push subscriptions, background jobs and
//! their typed payloads, and the minimal user record the pipeline consumes.

pub mod job;
pub mod notification;
pub mod user;
