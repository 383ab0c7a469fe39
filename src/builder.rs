use std::sync::Arc;

use tokio::runtime::{Builder, Runtime, RuntimeFlavor};

use crate::{
    Config, ProcflowError, Result, Service,
    model::DataManager,
    runtime::{Job, ServiceContext},
    store::{self, DbStore, ProcessLogger},
};

/// Assembles a `Service` from its configuration and collaborators.
///
/// Only the job is mandatory. Without a runtime one is built with
/// `async_worker_thread_number` threads, without a store the one selected
/// by the configuration is opened.
#[derive(Default)]
pub struct ServiceBuilder {
    config: Config,
    rt: Option<Arc<Runtime>>,
    job: Option<Arc<dyn Job>>,
    data_manager: Option<Arc<DataManager>>,
    store: Option<Arc<dyn DbStore>>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    /// Runtime to run on. It must be a multi-thread runtime, the store calls
    /// block in place from the job tasks; `build` rejects any other flavor.
    pub fn runtime(
        mut self,
        runtime: Arc<Runtime>,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn job(
        mut self,
        job: impl Job + 'static,
    ) -> Self {
        self.job = Some(Arc::new(job));
        self
    }

    pub fn data_manager(
        mut self,
        data_manager: Arc<DataManager>,
    ) -> Self {
        self.data_manager = Some(data_manager);
        self
    }

    /// Overrides the store selected by the configuration.
    pub fn store(
        mut self,
        store: Arc<dyn DbStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(&self) -> Result<Service> {
        let job = self.job.clone().ok_or_else(|| ProcflowError::Service("a job is required to build a service".to_string()))?;

        let runtime = match self.rt.as_ref() {
            Some(rt) if rt.handle().runtime_flavor() != RuntimeFlavor::MultiThread => {
                return Err(ProcflowError::Config("the service runtime must be a multi-thread runtime".to_string()));
            }
            Some(rt) => rt.clone(),
            None => {
                if self.config.async_worker_thread_number == 0 {
                    return Err(ProcflowError::Config("async_worker_thread_number must be at least 1".to_string()));
                }
                Arc::new(Builder::new_multi_thread().worker_threads(self.config.async_worker_thread_number.into()).enable_all().build()?)
            }
        };

        let db = match self.store.as_ref() {
            Some(store) => store.clone(),
            None => store::connect(&self.config.store, runtime.clone())?,
        };
        let logger = ProcessLogger::with_table_name(db, &self.config.log_table_name())?;

        let data_manager = self.data_manager.clone().unwrap_or_default();
        let ctx = ServiceContext::new(self.config.service.service_type, self.config.service.instance_id, logger, &data_manager);

        Ok(Service::new(ctx, data_manager, job, self.config.worker_thread_number, runtime))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::runtime::Builder;

    use super::ServiceBuilder;
    use crate::{
        Config, ProcflowError, Result,
        model::{DataManager, Process, ServiceType},
        runtime::{Job, JobContext, JobOutcome},
        store::{DbStore, MemStore, ProcessLogger, data::Status},
    };

    struct Noop;

    #[async_trait]
    impl Job for Noop {
        async fn run(
            &self,
            _ctx: &JobContext,
        ) -> Result<JobOutcome> {
            Ok(JobOutcome::NoData)
        }
    }

    #[test]
    fn test_job_is_required() {
        assert!(matches!(ServiceBuilder::new().build(), Err(ProcflowError::Service(_))));
    }

    #[test]
    fn test_current_thread_runtime_is_rejected() {
        let runtime = Arc::new(Builder::new_current_thread().enable_all().build().unwrap());
        let result = ServiceBuilder::new().runtime(runtime).store(Arc::new(MemStore::new())).job(Noop).build();
        assert!(matches!(result, Err(ProcflowError::Config(_))));

        let runtime = Arc::new(Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap());
        assert!(ServiceBuilder::new().runtime(runtime).store(Arc::new(MemStore::new())).job(Noop).build().is_ok());
    }

    #[test]
    fn test_build_names_and_repairs_log_table() {
        let store: Arc<dyn DbStore> = Arc::new(MemStore::new());
        let previous = ProcessLogger::with_table_name(store.clone(), "view_4").unwrap();
        let interrupted = previous.start(1).unwrap();

        let mut config = Config::default();
        config.service.service_type = ServiceType::View;
        config.service.instance_id = 4;
        let data_manager = Arc::new(DataManager::new());
        data_manager.add(Process::new(1, 4));

        let service = ServiceBuilder::new()
            .config(config)
            .async_worker_thread_number(1)
            .store(store)
            .data_manager(data_manager.clone())
            .job(Noop)
            .build()
            .unwrap();

        let logger = service.logger();
        assert_eq!(logger.table_name(), Some("view_4"));
        let log = logger.get_logs(1, 0, 0).unwrap().remove(0);
        assert_eq!(log.register.id, interrupted);
        assert_eq!(log.register.status, Status::Interrupted);

        assert!(Arc::ptr_eq(&service.data_manager(), &data_manager));
        assert_eq!(service.context().instance_id(), 4);
    }
}
