use std::sync::{Arc, RwLock, Weak};

use chrono::{DateTime, Utc};

use crate::{
    ProcflowError, Result, ShareLock,
    model::{DataManager, Process, ProcessId, ServiceType},
    runtime::ExecutionPackage,
    store::{
        ProcessLogger,
        data::{MessageType, RegisterId},
    },
};

/// State shared by every component of one service instance.
///
/// The process registry is only weakly held, it belongs to the `Service`.
pub struct ServiceContext {
    service_type: ServiceType,
    instance_id: u64,
    logger: ShareLock<ProcessLogger>,
    data_manager: Weak<DataManager>,
}

impl ServiceContext {
    pub fn new(
        service_type: ServiceType,
        instance_id: u64,
        logger: ProcessLogger,
        data_manager: &Arc<DataManager>,
    ) -> Self {
        Self {
            service_type,
            instance_id,
            logger: Arc::new(RwLock::new(logger)),
            data_manager: Arc::downgrade(data_manager),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Snapshot of the logger, later table changes do not affect it.
    pub fn logger(&self) -> ProcessLogger {
        self.logger.read().unwrap().clone()
    }

    /// Switches the log tables of the service, see `ProcessLogger::set_table_name`.
    pub fn set_log_table(
        &self,
        name: &str,
    ) -> Result<()> {
        self.logger.write().unwrap().set_table_name(name)
    }

    /// The process registry, `None` once its owner dropped it.
    pub fn data_manager(&self) -> Option<Arc<DataManager>> {
        self.data_manager.upgrade()
    }

    pub(crate) fn weak_data_manager(&self) -> Weak<DataManager> {
        self.data_manager.clone()
    }

    /// Whether this instance runs the process.
    pub fn owns(
        &self,
        process: &Process,
    ) -> bool {
        process.service_instance_id == self.instance_id
    }
}

/// What a job sees of the service: its package, a logger bound to the
/// package register and a weak handle to the process registry.
#[derive(Clone)]
pub struct JobContext {
    package: ExecutionPackage,
    logger: ProcessLogger,
    data_manager: Weak<DataManager>,
}

impl JobContext {
    pub(crate) fn new(
        package: ExecutionPackage,
        logger: ProcessLogger,
        data_manager: Weak<DataManager>,
    ) -> Self {
        Self {
            package,
            logger,
            data_manager,
        }
    }

    pub fn package(&self) -> &ExecutionPackage {
        &self.package
    }

    pub fn process_id(&self) -> ProcessId {
        self.package.process_id
    }

    pub fn register_id(&self) -> RegisterId {
        self.package.register_id
    }

    pub fn execution_date(&self) -> DateTime<Utc> {
        self.package.execution_date
    }

    pub fn logger(&self) -> &ProcessLogger {
        &self.logger
    }

    /// Attaches a message to the register of this execution.
    pub fn log(
        &self,
        message_type: MessageType,
        description: &str,
    ) -> Result<()> {
        self.logger.log(message_type, description, self.package.register_id)
    }

    /// Appends a value under `tag` in the register data of this execution.
    pub fn add_value(
        &self,
        tag: &str,
        value: &str,
    ) -> Result<()> {
        self.logger.add_value(tag, value, self.package.register_id)
    }

    /// Newest data timestamp produced by previous runs of the process.
    pub fn last_data_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        self.logger.get_data_last_timestamp(self.package.process_id)
    }

    pub fn data_manager(&self) -> Result<Arc<DataManager>> {
        self.data_manager.upgrade().ok_or_else(|| ProcflowError::Job("Unable to access DataManager".to_string()))
    }

    /// Definition of the executed process, fails if it was removed meanwhile.
    pub fn process(&self) -> Result<Arc<Process>> {
        self.data_manager()?
            .find(self.package.process_id)
            .ok_or_else(|| ProcflowError::Process(format!("process {} not found", self.package.process_id)))
    }
}
