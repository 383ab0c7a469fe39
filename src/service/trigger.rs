//! Channel between the process timers and the service trigger loop.

use chrono::{DateTime, Utc};

use crate::{ProcflowError, Result, model::ProcessId};

/// Execution request emitted by a timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Trigger {
    pub process_id: ProcessId,
    pub execution_date: DateTime<Utc>,
}

/// Bounded FIFO of triggers. Every timer holds a clone, the trigger loop
/// drains it; a full queue holds the timer back instead of dropping ticks.
#[derive(Clone)]
pub(crate) struct TriggerQueue {
    sender: flume::Sender<Trigger>,
    receiver: flume::Receiver<Trigger>,
}

impl TriggerQueue {
    pub fn new(cap: usize) -> Self {
        let (sender, receiver) = flume::bounded(cap);

        Self {
            sender,
            receiver,
        }
    }

    pub async fn push(
        &self,
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
    ) -> Result<()> {
        self.sender
            .send_async(Trigger {
                process_id,
                execution_date,
            })
            .await
            .map_err(|e| ProcflowError::Queue(format!("trigger of process {} lost: queue closed", e.into_inner().process_id)))
    }

    pub async fn next(&self) -> Option<Trigger> {
        self.receiver.recv_async().await.ok()
    }

    /// Triggers not yet picked up by the service.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}
