use serde::{Deserialize, Serialize};

use crate::{ProcflowError, Result, model::Schedule};

/// Logical identifier of a schedulable unit of work (a collector rule, an analysis, a view).
pub type ProcessId = u64;

/// Definition of a process as known by a service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub id: ProcessId,
    /// Service instance that must execute this process.
    pub service_instance_id: u64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

fn default_active() -> bool {
    true
}

impl Process {
    pub fn new(
        id: ProcessId,
        service_instance_id: u64,
    ) -> Self {
        Self {
            id,
            service_instance_id,
            active: true,
            schedule: None,
        }
    }

    pub fn with_schedule(
        mut self,
        schedule: Schedule,
    ) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let process = serde_json::from_str::<Process>(s);
        match process {
            Ok(v) => Ok(v),
            Err(e) => Err(ProcflowError::Process(format!("{}", e))),
        }
    }
}
