use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, model::ProcessId, runtime::JobContext, store::data::RegisterId};

/// One requested execution of a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPackage {
    pub process_id: ProcessId,
    /// Register opened for this execution by `ProcessLogger::start`.
    pub register_id: RegisterId,
    /// Nominal time of the execution, not the wall-clock dispatch time.
    pub execution_date: DateTime<Utc>,
    /// The register was marked ON_QUEUE and goes back to START on dispatch.
    pub on_queue: bool,
}

impl ExecutionPackage {
    pub fn new(
        process_id: ProcessId,
        register_id: RegisterId,
        execution_date: DateTime<Utc>,
    ) -> Self {
        Self {
            process_id,
            register_id,
            execution_date,
            on_queue: false,
        }
    }
}

/// Successful result of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Data was produced, `data_timestamp` is the time of the newest data (if any).
    Done {
        data_timestamp: Option<DateTime<Utc>>,
        extra_info: BTreeMap<String, Value>,
    },
    /// Nothing to process for the execution date.
    NoData,
}

impl JobOutcome {
    pub fn done(data_timestamp: Option<DateTime<Utc>>) -> Self {
        JobOutcome::Done {
            data_timestamp,
            extra_info: BTreeMap::new(),
        }
    }
}

/// Body of a process execution.
///
/// Whatever the job returns, or if it panics, the service writes the
/// terminal status of the register and releases the process. Messages
/// and values can be attached to the register through the context.
#[async_trait]
pub trait Job: Send + Sync {
    /// Executes the process described by `ctx.package()`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The [`JobContext`] of the execution.
    ///
    /// # Returns
    ///
    /// Returns a [`Result<JobOutcome>`], an error is stored as an ERROR message.
    async fn run(
        &self,
        ctx: &JobContext,
    ) -> Result<JobOutcome>;
}
