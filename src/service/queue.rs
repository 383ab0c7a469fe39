use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::{model::ProcessId, runtime::ExecutionPackage};

/// Queue bookkeeping of a service.
///
/// A process is active from the moment a package of it is queued until the
/// run finishes with an empty wait-queue. While active, new packages of the
/// same process wait in FIFO order, so at most one package per process is
/// either queued or running.
#[derive(Debug, Default)]
pub(crate) struct SchedulerState {
    queued: VecDeque<ExecutionPackage>,
    active: HashSet<ProcessId>,
    running: HashSet<ProcessId>,
    waiting: HashMap<ProcessId, VecDeque<ExecutionPackage>>,
}

/// Point-in-time view of the service queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    /// Packages on the primary queue.
    pub queued: usize,
    /// Packages parked behind an active process.
    pub waiting: usize,
    /// Processes with a package queued or running, sorted.
    pub active: Vec<ProcessId>,
    /// Processes currently running, sorted.
    pub running: Vec<ProcessId>,
}

impl SchedulerState {
    pub fn is_active(
        &self,
        process_id: ProcessId,
    ) -> bool {
        self.active.contains(&process_id)
    }

    /// Pushes the package on the primary queue, the process becomes active.
    pub fn enqueue(
        &mut self,
        package: ExecutionPackage,
    ) {
        self.active.insert(package.process_id);
        self.queued.push_back(package);
    }

    pub fn wait(
        &mut self,
        package: ExecutionPackage,
    ) {
        self.waiting.entry(package.process_id).or_default().push_back(package);
    }

    /// Takes the next package to dispatch.
    pub fn pop(&mut self) -> Option<ExecutionPackage> {
        let package = self.queued.pop_front()?;
        self.running.insert(package.process_id);
        Some(package)
    }

    /// Ends the run of a process. Its next waiting package, if any, goes to
    /// the primary queue and `true` is returned, otherwise the process is idle.
    pub fn finish(
        &mut self,
        process_id: ProcessId,
    ) -> bool {
        self.running.remove(&process_id);

        let next = match self.waiting.get_mut(&process_id) {
            Some(waiting) => {
                let next = waiting.pop_front();
                if waiting.is_empty() {
                    self.waiting.remove(&process_id);
                }
                next
            }
            None => None,
        };

        match next {
            Some(package) => {
                self.queued.push_back(package);
                true
            }
            None => {
                self.active.remove(&process_id);
                false
            }
        }
    }

    /// Drops every package of the process that did not start yet. A running
    /// package is left alone and releases the process when it finishes.
    pub fn remove(
        &mut self,
        process_id: ProcessId,
    ) -> Vec<ExecutionPackage> {
        let (stripped, kept): (Vec<_>, Vec<_>) = self.queued.drain(..).partition(|p| p.process_id == process_id);
        self.queued = kept.into();

        let mut stripped = stripped;
        stripped.extend(self.waiting.remove(&process_id).unwrap_or_default());

        if !self.running.contains(&process_id) {
            self.active.remove(&process_id);
        }
        stripped
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let mut active = self.active.iter().copied().collect::<Vec<_>>();
        active.sort_unstable();
        let mut running = self.running.iter().copied().collect::<Vec<_>>();
        running.sort_unstable();

        QueueSnapshot {
            queued: self.queued.len(),
            waiting: self.waiting.values().map(VecDeque::len).sum(),
            active,
            running,
        }
    }
}
