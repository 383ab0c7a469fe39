//! Dispatch side of the service: queue admission, the main loop and the
//! job boundary.

use std::{
    any::Any,
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, atomic::AtomicUsize},
};

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use crate::{
    common::{BroadcastQueue, Shutdown},
    events::{Event, JobFinished, Message, ServiceEvent, tags},
    model::ProcessId,
    runtime::{ExecutionPackage, Job, JobContext, JobOutcome, ServiceContext},
    store::{
        ProcessLogger,
        data::{MessageType, RegisterId, Status},
    },
    utils,
};

use super::queue::{QueueSnapshot, SchedulerState};

pub(crate) const NO_DATA_MESSAGE: &str = "No data available";

/// Everything a dispatched job needs to report back. Cloned into the
/// main loop and every job task, it never holds the runtime.
#[derive(Clone)]
pub(crate) struct Executor {
    ctx: Arc<ServiceContext>,
    job: Arc<dyn Job>,
    state: Arc<Mutex<SchedulerState>>,
    notify: Arc<Notify>,
    workers: Arc<Semaphore>,
    threads: Arc<AtomicUsize>,
    events: Arc<BroadcastQueue<Event<Message>>>,
}

impl Executor {
    pub fn new(
        ctx: Arc<ServiceContext>,
        job: Arc<dyn Job>,
        events: Arc<BroadcastQueue<Event<Message>>>,
        threads: usize,
    ) -> Self {
        Self {
            ctx,
            job,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            notify: Arc::new(Notify::new()),
            workers: Arc::new(Semaphore::new(threads)),
            threads: Arc::new(AtomicUsize::new(threads)),
            events,
        }
    }

    pub fn ctx(&self) -> &Arc<ServiceContext> {
        &self.ctx
    }

    pub fn workers(&self) -> &Arc<Semaphore> {
        &self.workers
    }

    pub fn threads(&self) -> &AtomicUsize {
        &self.threads
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().unwrap().snapshot()
    }

    pub fn add_to_queue(
        &self,
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
    ) {
        let process = match self.ctx.data_manager().and_then(|dm| dm.find(process_id)) {
            Some(process) => process,
            None => {
                warn!(process_id, "trigger for an unknown process ignored");
                return;
            }
        };
        if !self.ctx.owns(&process) {
            debug!(process_id, instance_id = process.service_instance_id, "process belongs to another instance");
            return;
        }

        let logger = self.ctx.logger();
        let register_id = match logger.start(process_id) {
            Ok(id) => id,
            Err(e) => {
                error!(process_id, "failed to open register: {}", e);
                return;
            }
        };
        let mut package = ExecutionPackage::new(process_id, register_id, execution_date);

        // the status write happens outside the lock, a package is only
        // published once its row reflects where it goes
        let event = loop {
            {
                let mut state = self.state.lock().unwrap();
                if !state.is_active(process_id) {
                    state.enqueue(package);
                    break ServiceEvent::Queued(execution_date);
                }
                if package.on_queue {
                    state.wait(package);
                    break ServiceEvent::OnQueue(execution_date);
                }
            }

            if let Err(e) = logger.result(Status::OnQueue, None, register_id) {
                error!(process_id, register_id, "failed to mark register as on queue: {}", e);
            }
            package.on_queue = true;
        };

        match event {
            ServiceEvent::Queued(_) => {
                self.notify.notify_one();
                debug!(process_id, register_id, "queued");
            }
            _ => debug!(process_id, register_id, "waiting on queue"),
        }
        self.emit(process_id, register_id, event);
    }

    /// Releases the process after a run, promoting its next waiting package.
    pub fn notify_wait_queue(
        &self,
        process_id: ProcessId,
    ) {
        if self.state.lock().unwrap().finish(process_id) {
            self.notify.notify_one();
        }
    }

    /// Strips the pending packages of a process and closes their registers.
    pub fn remove(
        &self,
        process_id: ProcessId,
    ) -> usize {
        let stripped = self.state.lock().unwrap().remove(process_id);
        if stripped.is_empty() {
            return 0;
        }

        let logger = self.ctx.logger();
        for package in stripped.iter() {
            if let Err(e) = logger.result(Status::NotExecuted, None, package.register_id) {
                error!(process_id, register_id = package.register_id, "failed to mark register as not executed: {}", e);
            }
            self.emit(process_id, package.register_id, ServiceEvent::NotExecuted);
        }
        info!(process_id, count = stripped.len(), "removed pending executions");
        stripped.len()
    }

    /// Main loop: takes a worker permit, then the next package, and spawns the job.
    pub async fn run(
        self,
        shutdown: Arc<Shutdown>,
    ) {
        loop {
            let permit = tokio::select! {
                _ = shutdown.wait() => break,
                permit = self.workers.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let package = loop {
                if let Some(package) = self.state.lock().unwrap().pop() {
                    break Some(package);
                }
                tokio::select! {
                    _ = shutdown.wait() => break None,
                    _ = self.notify.notified() => {}
                }
            };
            let Some(package) = package else {
                break;
            };

            let executor = self.clone();
            tokio::spawn(async move {
                executor.execute(package, permit).await;
            });
        }
        debug!("service main loop stopped");
    }

    /// Runs one package. Whatever happens, the register ends in a terminal
    /// status, the process is released and a finished event is sent.
    async fn execute(
        self,
        package: ExecutionPackage,
        _permit: OwnedSemaphorePermit,
    ) {
        let process_id = package.process_id;
        let register_id = package.register_id;
        let logger = self.ctx.logger();

        if package.on_queue {
            if let Err(e) = logger.result(Status::Start, None, register_id) {
                error!(process_id, register_id, "failed to mark register as started: {}", e);
            }
        }
        self.emit(process_id, register_id, ServiceEvent::Running(package.execution_date));

        if let Err(e) = logger.set_start_processing_time(utils::time::now(), register_id) {
            warn!(process_id, register_id, "{}", e);
        }

        let data_manager = self.ctx.weak_data_manager();
        let run = if data_manager.strong_count() == 0 {
            Err(RunFailure::Error("Unable to access DataManager".to_string()))
        } else {
            let ctx = JobContext::new(package.clone(), logger.clone(), data_manager);
            match AssertUnwindSafe(self.job.run(&ctx)).catch_unwind().await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(e)) => Err(RunFailure::Error(e.to_string())),
                Err(panic) => Err(RunFailure::Panic(panic_message(panic))),
            }
        };

        if let Err(e) = logger.set_end_processing_time(utils::time::now(), register_id) {
            warn!(process_id, register_id, "{}", e);
        }

        let (success, automatic, mut extra_info) = match run {
            Ok(JobOutcome::Done {
                data_timestamp,
                extra_info,
            }) => {
                close(&logger, process_id, register_id, Status::Done, data_timestamp, None);
                (true, true, extra_info)
            }
            Ok(JobOutcome::NoData) => {
                info!(process_id, register_id, "{}", NO_DATA_MESSAGE);
                close(&logger, process_id, register_id, Status::Done, None, Some((MessageType::Warning, NO_DATA_MESSAGE)));
                (true, false, BTreeMap::new())
            }
            Err(failure) => {
                let description = failure.to_string();
                error!(process_id, register_id, "{}", description);
                close(&logger, process_id, register_id, Status::Error, Some(utils::time::now()), Some((MessageType::Error, description.as_str())));
                (false, false, BTreeMap::new())
            }
        };

        self.notify_wait_queue(process_id);

        extra_info.insert(tags::PROCESS_ID.to_string(), Value::from(process_id));
        extra_info.insert(tags::RESULT.to_string(), Value::from(success));
        extra_info.insert(
            tags::EXECUTION_DATE.to_string(),
            Value::from(package.execution_date.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        extra_info.insert(tags::AUTOMATIC.to_string(), Value::from(automatic));

        debug!(process_id, register_id, success, "process finished");
        self.emit(
            process_id,
            register_id,
            ServiceEvent::Finished(JobFinished {
                process_id,
                execution_date: package.execution_date,
                success,
                extra_info,
            }),
        );
    }

    fn emit(
        &self,
        process_id: ProcessId,
        register_id: RegisterId,
        event: ServiceEvent,
    ) {
        // no subscriber until the channel listens
        self.events.publish(Event::new(&Message {
            process_id,
            register_id,
            event,
        }));
    }
}

enum RunFailure {
    Error(String),
    Panic(String),
}

impl std::fmt::Display for RunFailure {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            RunFailure::Error(msg) => write!(f, "{}", msg),
            RunFailure::Panic(msg) => write!(f, "job panicked: {}", msg),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Writes the optional message then the terminal status of a register.
fn close(
    logger: &ProcessLogger,
    process_id: ProcessId,
    register_id: RegisterId,
    status: Status,
    data_timestamp: Option<DateTime<Utc>>,
    message: Option<(MessageType, &str)>,
) {
    if let Some((message_type, description)) = message {
        if let Err(e) = logger.log(message_type, description, register_id) {
            error!(process_id, register_id, "failed to log message: {}", e);
        }
    }
    if let Err(e) = logger.result(status, data_timestamp, register_id) {
        error!(process_id, register_id, "failed to write result: {}", e);
    }
}
