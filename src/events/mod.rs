//! Event types for process execution.
//!
//! Events are emitted by the service while a process moves through the
//! queue to notify subscribers about queueing, dispatch and completion.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::{model::ProcessId, store::data::RegisterId};

/// Keys always present in `JobFinished::extra_info`.
pub mod tags {
    pub const PROCESS_ID: &str = "process_id";
    pub const RESULT: &str = "result";
    pub const EXECUTION_DATE: &str = "execution_date";
    pub const AUTOMATIC: &str = "automatic";
}

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Lifecycle step of one execution package.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// Pushed on the primary queue.
    Queued(DateTime<Utc>),
    /// Parked on the wait-queue behind a running execution of the same process.
    OnQueue(DateTime<Utc>),
    /// Handed to a worker.
    Running(DateTime<Utc>),
    /// Stripped from the queues before running.
    NotExecuted,
    Finished(JobFinished),
}

/// Event message carrying the package it belongs to.
#[derive(Debug, Clone)]
pub struct Message {
    pub process_id: ProcessId,
    pub register_id: RegisterId,
    pub event: ServiceEvent,
}

/// Emitted once per dispatched package, after the terminal status is written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFinished {
    pub process_id: ProcessId,
    pub execution_date: DateTime<Utc>,
    pub success: bool,
    /// `process_id`, `result`, `execution_date`, `automatic` plus whatever the job reported.
    pub extra_info: BTreeMap<String, Value>,
}

impl JobFinished {
    /// Whether follow-up processes may be triggered by this run.
    pub fn is_automatic(&self) -> bool {
        self.extra_info.get(tags::AUTOMATIC).and_then(Value::as_bool).unwrap_or(false)
    }
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }
}

impl ServiceEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, ServiceEvent::Finished(f) if !f.success)
    }

    pub fn finished(&self) -> Option<&JobFinished> {
        match self {
            ServiceEvent::Finished(f) => Some(f),
            _ => None,
        }
    }
}
