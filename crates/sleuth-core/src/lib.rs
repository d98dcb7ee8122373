//! sleuth-core
//!
//! Background task queue and external-tool execution engine for OSINT
//! lookups: submissions are rate-limited per user, run with bounded
//! concurrency under a timeout, and their text output is parsed into
//! `Finding`s that callers poll for.
//!
//! # モジュール構成
//! - **domain**: ids, task types, status, findings, failure kinds
//! - **ports**: clock and id generation seams
//! - **exec**: process executor and HTTP prober behind `Executor`
//! - **parser**: line grammar, noise filter, substring fallback
//! - **registry**: task type -> tool (invocation + parser)
//! - **ratelimit**: per (user, type) windows
//! - **queue**: task records and the in-memory store
//! - **app**: builder, scheduler, dispatcher

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod observability;
pub mod parser;
pub mod ports;
pub mod queue;
pub mod ratelimit;
pub mod registry;

pub use app::{Scheduler, SchedulerBuilder, SchedulerHandle};
pub use config::SchedulerConfig;
pub use domain::{Finding, TaskId, TaskStatus, TaskType};
pub use error::{BuildError, CancelError, StatusError, SubmitError, WaitError};
pub use observability::QueueStats;
pub use queue::TaskSnapshot;
