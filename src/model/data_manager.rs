use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    ShareLock,
    model::{Process, ProcessId},
};

/// Registry of the process definitions known by a service.
///
/// Jobs only receive a weak reference to it, so a job that outlives its
/// service observes the registry as gone instead of keeping it alive.
#[derive(Default)]
pub struct DataManager {
    processes: ShareLock<HashMap<ProcessId, Arc<Process>>>,
}

impl DataManager {
    pub fn new() -> Self {
        Self {
            processes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Adds or replaces a process definition.
    pub fn add(
        &self,
        process: Process,
    ) -> Arc<Process> {
        let process = Arc::new(process);
        self.processes.write().unwrap().insert(process.id, process.clone());
        process
    }

    pub fn remove(
        &self,
        id: ProcessId,
    ) -> Option<Arc<Process>> {
        self.processes.write().unwrap().remove(&id)
    }

    pub fn find(
        &self,
        id: ProcessId,
    ) -> Option<Arc<Process>> {
        self.processes.read().unwrap().get(&id).cloned()
    }
}
