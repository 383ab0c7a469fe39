//! # Procflow
//!
//! Procflow is the process execution core of a family of data services
//! (collectors, analyses, views, alerts, interpolators). It decides when a
//! process runs, makes sure two executions of the same process never
//! overlap, and keeps a durable log of every execution attempt.
//!
//! ## Core Features
//!
//! - **Serialized Execution**: One execution per process at a time, later triggers wait in FIFO order
//! - **Crash-Safe Process Log**: Executions left running or queued by a dead service are repaired on startup
//! - **Async Execution**: Powered by `tokio`, jobs run on a bounded worker pool
//! - **Pluggable Storage**: Supports in-memory storage (testing) and PostgreSQL (production)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procflow::{Config, Process, Schedule, ServiceBuilder};
//!
//! let service = ServiceBuilder::new().config(Config::create("procflow.toml")?).job(MyJob).build()?;
//! service.launch();
//!
//! // Run process 1 every ten minutes
//! service.add_process(Process::new(1, 3).with_schedule(Schedule::new(10, "min")))?;
//!
//! // Inspect its most recent executions
//! let logs = service.logger().get_logs(1, 0, 9)?;
//! ```

mod builder;
mod common;
mod config;
mod error;
pub mod events;
mod model;
mod runtime;
mod service;
pub mod store;
mod utils;

use std::sync::{Arc, RwLock};

pub use builder::ServiceBuilder;
pub use config::{Config, PostgresConfig, ServiceConfig, StoreConfig, StoreType};
pub use error::ProcflowError;
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, ExecutionPackage, Job, JobContext, JobOutcome, ServiceContext};
pub use service::{QueueSnapshot, Service, ServiceStatus, Timer};
pub use store::ProcessLogger;

/// Result type alias for Procflow operations.
pub type Result<T> = std::result::Result<T, ProcflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
