//! Process execution service - the main entry point of procflow.
//!
//! The service manages the execution of the processes it owns:
//! - Periodic triggers from per-process timers
//! - A primary queue serialized per process id, with a wait-queue for
//!   triggers that arrive while the process is queued or running
//! - A bounded worker pool running the job bodies
//! - Events for every queued, started and finished execution

mod executor;
mod queue;
mod timer;
mod trigger;

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{runtime::Runtime, sync::Semaphore};
use tracing::{debug, info, warn};

use crate::{
    Result, ShareLock,
    common::Shutdown,
    model::{DataManager, Process, ProcessId, Schedule},
    runtime::{Channel, Job, ServiceContext},
    store::ProcessLogger,
};

use executor::Executor;
use trigger::TriggerQueue;

pub use queue::QueueSnapshot;
pub use timer::Timer;

/// Size of the queue between the timers and the service.
const TRIGGER_QUEUE_SIZE: usize = 1024;

/// Point-in-time view of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    /// Size of the worker pool.
    pub threads: usize,
    /// Processes with an active timer.
    pub timers: usize,
    /// Timer ticks not yet admitted.
    pub triggers: usize,
    #[serde(flatten)]
    pub queue: QueueSnapshot,
}

/// The process execution service.
///
/// # Example
///
/// ```rust,ignore
/// let service = ServiceBuilder::new().config(config).job(MyJob).build()?;
/// service.launch();
///
/// // Register a process, its timer triggers the executions
/// service.add_process(Process::new(1, instance_id).with_schedule(Schedule::new(10, "min")))?;
///
/// // Or trigger one by hand
/// service.add_to_queue(1, Utc::now());
///
/// service.stop();
/// ```
pub struct Service {
    /// Queue state, worker pool and job boundary.
    executor: Executor,
    /// Owner of the process registry, the rest of the service only holds weak references.
    data_manager: Arc<DataManager>,
    timers: ShareLock<HashMap<ProcessId, Timer>>,
    trigger_queue: TriggerQueue,
    /// Event channel for service events.
    channel: Arc<Channel>,

    running: Arc<AtomicBool>,
    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Service {
    pub(crate) fn new(
        ctx: ServiceContext,
        data_manager: Arc<DataManager>,
        job: Arc<dyn Job>,
        threads: usize,
        runtime: Arc<Runtime>,
    ) -> Self {
        let channel = Arc::new(Channel::new(runtime.clone()));
        let executor = Executor::new(Arc::new(ctx), job, channel.event_queue(), resolve_threads(threads));

        Self {
            executor,
            data_manager,
            timers: Arc::new(RwLock::new(HashMap::new())),
            trigger_queue: TriggerQueue::new(TRIGGER_QUEUE_SIZE),
            channel,
            running: Arc::new(AtomicBool::new(false)),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Starts the main loop, the trigger loop and the event channel.
    ///
    /// Packages queued before launching are dispatched right away. A stopped
    /// service can not be launched again.
    pub fn launch(&self) {
        if self.shutdown.is_terminated() {
            warn!("service was stopped, build a new one to launch again");
            return;
        }
        if self.running.swap(true, Ordering::Relaxed) {
            return;
        }

        self.channel.listen();
        self.runtime.spawn(self.executor.clone().run(self.shutdown.clone()));

        let executor = self.executor.clone();
        let trigger_queue = self.trigger_queue.clone();
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Some(trigger) = trigger_queue.next() => {
                        executor.add_to_queue(trigger.process_id, trigger.execution_date);
                    }
                }
            }
        });

        let ctx = self.executor.ctx();
        info!(
            service_type = ctx.service_type().as_ref(),
            instance_id = ctx.instance_id(),
            threads = self.executor.threads().load(Ordering::Relaxed),
            "service launched"
        );
    }

    /// Stops the timers and the dispatching of new packages.
    ///
    /// Running jobs are not interrupted, their results are still written.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        self.timers.write().unwrap().clear();
        self.shutdown.shutdown();
        self.channel.shutdown();
        info!("service stopped");
    }

    /// Requests an execution of a process.
    ///
    /// Never fails: unknown processes and processes owned by another
    /// instance are ignored, store errors are logged.
    pub fn add_to_queue(
        &self,
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
    ) {
        self.executor.add_to_queue(process_id, execution_date);
    }

    /// Releases a process after a run, its next waiting package (if any) is queued.
    pub fn notify_wait_queue(
        &self,
        process_id: ProcessId,
    ) {
        self.executor.notify_wait_queue(process_id);
    }

    /// Registers a process definition and, when it is active, owned by this
    /// instance and scheduled, starts its timer.
    pub fn add_process(
        &self,
        process: Process,
    ) -> Result<()> {
        let process = self.data_manager.add(process);
        let process_id = process.id;

        let schedule = match process.schedule.as_ref() {
            Some(schedule) if process.active && self.executor.ctx().owns(&process) => schedule,
            _ => {
                debug!(process_id, "process registered without timer");
                return Ok(());
            }
        };

        let last_process = self.logger().get_last_process_timestamp(process_id)?;
        let trigger_queue = self.trigger_queue.clone();
        let timer = Timer::new(schedule, process_id, last_process, &self.runtime, move |process_id, execution_date| {
            let trigger_queue = trigger_queue.clone();
            async move {
                if let Err(e) = trigger_queue.push(process_id, execution_date).await {
                    warn!(process_id, "failed to send trigger: {}", e);
                }
            }
        })?;

        self.timers.write().unwrap().insert(process_id, timer);
        info!(process_id, "process scheduled");
        Ok(())
    }

    /// Replaces a process definition, pending executions of the old one are dropped.
    pub fn update_process(
        &self,
        process: Process,
    ) -> Result<()> {
        self.remove_process(process.id);
        self.add_process(process)
    }

    /// Forgets a process: stops its timer and drops its pending executions,
    /// whose registers move to NOT_EXECUTED. A running execution finishes.
    ///
    /// Returns the number of dropped executions.
    pub fn remove_process(
        &self,
        process_id: ProcessId,
    ) -> usize {
        self.timers.write().unwrap().remove(&process_id);
        self.data_manager.remove(process_id);
        self.executor.remove(process_id)
    }

    /// Queues one execution per schedule period over `[begin, end]`, oldest first.
    ///
    /// Returns the number of requested executions.
    pub fn add_reprocessing(
        &self,
        process_id: ProcessId,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        schedule: &Schedule,
    ) -> Result<usize> {
        let dates = schedule.dates_between(begin, end)?;
        info!(process_id, count = dates.len(), "reprocessing historical data");
        for date in dates.iter() {
            self.executor.add_to_queue(process_id, *date);
        }
        Ok(dates.len())
    }

    /// Resizes the worker pool, `0` means one worker per available core.
    ///
    /// Shrinking takes effect as running jobs return their permits.
    pub fn update_number_of_threads(
        &self,
        n: usize,
    ) {
        let n = resolve_threads(n);
        let old = self.executor.threads().swap(n, Ordering::Relaxed);

        if n > old {
            self.executor.workers().add_permits(n - old);
        } else if n < old {
            let workers = self.executor.workers().clone();
            let surplus = u32::try_from(old - n).unwrap_or(u32::MAX);
            self.runtime.spawn(async move {
                if let Ok(permits) = workers.acquire_many_owned(surplus).await {
                    permits.forget();
                }
            });
        }
        info!(threads = n, "worker pool resized");
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            running: self.running.load(Ordering::Relaxed),
            threads: self.executor.threads().load(Ordering::Relaxed),
            timers: self.timers.read().unwrap().len(),
            triggers: self.trigger_queue.len(),
            queue: self.executor.snapshot(),
        }
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }

    pub fn context(&self) -> Arc<ServiceContext> {
        self.executor.ctx().clone()
    }

    pub fn data_manager(&self) -> Arc<DataManager> {
        self.data_manager.clone()
    }

    /// Snapshot of the service logger.
    pub fn logger(&self) -> ProcessLogger {
        self.executor.ctx().logger()
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.stop();
    }
}

fn resolve_threads(n: usize) -> usize {
    let n = if n == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        n
    };
    n.min(Semaphore::MAX_PERMITS)
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Arc, mpsc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone, Utc};
    use tokio::{
        runtime::{Builder, Runtime},
        sync::Semaphore,
    };

    use super::Service;
    use crate::{
        ChannelEvent, ChannelOptions, Config, ProcflowError, Result, ServiceBuilder,
        events::{JobFinished, tags},
        model::{Process, Schedule, ServiceType},
        runtime::{Job, JobContext, JobOutcome},
        store::data::{MessageType, Status},
    };

    const INSTANCE: u64 = 1;
    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Blocks every run on a gate and tracks how many runs overlap.
    #[derive(Clone)]
    struct GateJob {
        gate: Arc<Semaphore>,
        current: Arc<AtomicUsize>,
        max: Arc<AtomicUsize>,
    }

    impl GateJob {
        fn closed() -> Self {
            Self {
                gate: Arc::new(Semaphore::new(0)),
                current: Arc::new(AtomicUsize::new(0)),
                max: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn open() -> Self {
            let job = Self::closed();
            job.release(1000);
            job
        }

        fn release(
            &self,
            n: usize,
        ) {
            self.gate.add_permits(n);
        }
    }

    #[async_trait]
    impl Job for GateJob {
        async fn run(
            &self,
            ctx: &JobContext,
        ) -> Result<JobOutcome> {
            let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(current, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }

            self.current.fetch_sub(1, Ordering::SeqCst);
            ctx.log(MessageType::Info, "gate passed")?;
            Ok(JobOutcome::done(Some(ctx.execution_date())))
        }
    }

    /// Outcome chosen by process id.
    struct OutcomeJob;

    #[async_trait]
    impl Job for OutcomeJob {
        async fn run(
            &self,
            ctx: &JobContext,
        ) -> Result<JobOutcome> {
            match ctx.process_id() {
                1 => Err(ProcflowError::Job("boom".to_string())),
                2 => panic!("job exploded"),
                3 => Ok(JobOutcome::NoData),
                _ => {
                    ctx.add_value("files", "a.tif")?;
                    let mut outcome = JobOutcome::done(Some(ctx.execution_date()));
                    if let JobOutcome::Done {
                        extra_info,
                        ..
                    } = &mut outcome
                    {
                        extra_info.insert("files".to_string(), serde_json::json!(1));
                    }
                    Ok(outcome)
                }
            }
        }
    }

    fn runtime() -> Arc<Runtime> {
        Arc::new(Builder::new_multi_thread().worker_threads(4).enable_all().build().unwrap())
    }

    fn service(
        job: impl Job + 'static,
        threads: usize,
    ) -> (Arc<Runtime>, Service) {
        let runtime = runtime();
        let mut config = Config::default();
        config.service.service_type = ServiceType::Analysis;
        config.service.instance_id = INSTANCE;
        config.worker_thread_number = threads;

        let service = ServiceBuilder::new().config(config).runtime(runtime.clone()).job(job).build().unwrap();
        (runtime, service)
    }

    fn finished(service: &Service) -> mpsc::Receiver<JobFinished> {
        let (tx, rx) = mpsc::channel();
        ChannelEvent::channel(service.channel(), ChannelOptions::default()).on_finished(move |f| {
            let _ = tx.send(f.clone());
        });
        rx
    }

    fn wait_until(f: impl Fn() -> bool) {
        for _ in 0..500 {
            if f() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_runs_of_a_process_never_overlap() {
        let job = GateJob::open();
        let (_runtime, service) = service(job.clone(), 4);
        let rx = finished(&service);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.launch();

        for _ in 0..5 {
            service.add_to_queue(1, Utc::now());
        }
        for _ in 0..5 {
            assert!(rx.recv_timeout(TIMEOUT).unwrap().success);
        }

        assert_eq!(job.max.load(Ordering::SeqCst), 1);
        let logs = service.logger().get_logs(1, 0, 10).unwrap();
        assert_eq!(logs.len(), 5);
        assert!(logs.iter().all(|l| l.register.status == Status::Done));
        assert!(logs.iter().all(|l| l.messages.len() == 1));

        wait_until(|| service.status().queue.active.is_empty());
    }

    #[test]
    fn test_distinct_processes_run_concurrently() {
        let job = GateJob::closed();
        let (_runtime, service) = service(job.clone(), 4);
        let rx = finished(&service);
        for id in 1..=3 {
            service.add_process(Process::new(id, INSTANCE)).unwrap();
        }
        service.launch();

        for id in 1..=3 {
            service.add_to_queue(id, Utc::now());
        }
        wait_until(|| job.current.load(Ordering::SeqCst) == 3);
        assert_eq!(service.status().queue.running, vec![1, 2, 3]);

        job.release(3);
        for _ in 0..3 {
            rx.recv_timeout(TIMEOUT).unwrap();
        }
    }

    #[test]
    fn test_trigger_while_running_waits_on_queue() {
        let job = GateJob::closed();
        let (_runtime, service) = service(job.clone(), 2);
        let rx = finished(&service);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.launch();

        let t1 = Utc.with_ymd_and_hms(2016, 11, 25, 0, 0, 0).unwrap();
        let t2 = t1 + TimeDelta::hours(1);
        service.add_to_queue(1, t1);
        wait_until(|| job.current.load(Ordering::SeqCst) == 1);
        service.add_to_queue(1, t2);

        let logger = service.logger();
        let logs = logger.get_logs(1, 0, 1).unwrap();
        assert_eq!(logs[0].register.status, Status::OnQueue);
        assert_eq!(logs[1].register.status, Status::Start);
        let status = service.status();
        assert_eq!(status.queue.waiting, 1);
        assert_eq!(status.queue.running, vec![1]);

        job.release(1);
        let first = rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(first.execution_date, t1);

        // the waiting package goes back to START once dispatched
        wait_until(|| job.current.load(Ordering::SeqCst) == 1);
        assert_eq!(logger.get_logs(1, 0, 0).unwrap()[0].register.status, Status::Start);

        job.release(1);
        let second = rx.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(second.execution_date, t2);

        let logs = logger.get_logs(1, 0, 1).unwrap();
        assert!(logs.iter().all(|l| l.register.status == Status::Done));
        assert_eq!(logs[0].register.data_timestamp, Some(t2));
        assert_eq!(logs[1].register.data_timestamp, Some(t1));
        assert_eq!(job.max.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_log_table_switch_leaves_running_job_on_its_table() {
        let job = GateJob::closed();
        let (_runtime, service) = service(job.clone(), 1);
        let rx = finished(&service);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.launch();

        let previous = service.logger();
        service.add_to_queue(1, Utc::now());
        wait_until(|| job.current.load(Ordering::SeqCst) == 1);

        service.context().set_log_table("analysis_9").unwrap();
        assert_eq!(service.logger().table_name(), Some("analysis_9"));
        assert_eq!(previous.table_name(), Some("analysis_1"));

        job.release(1);
        assert!(rx.recv_timeout(TIMEOUT).unwrap().success);
        let logs = previous.get_logs(1, 0, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].register.status, Status::Done);
        assert_eq!(logs[0].messages[0].description, "gate passed");
        assert!(service.logger().get_logs(1, 0, 10).unwrap().is_empty());

        // new triggers open their registers in the new table
        service.add_to_queue(1, Utc::now());
        job.release(1);
        assert!(rx.recv_timeout(TIMEOUT).unwrap().success);
        let logs = service.logger().get_logs(1, 0, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].register.status, Status::Done);
        assert_eq!(previous.get_logs(1, 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_process_drops_pending_executions() {
        let job = GateJob::closed();
        let (_runtime, service) = service(job.clone(), 2);
        let rx = finished(&service);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.launch();

        service.add_to_queue(1, Utc::now());
        wait_until(|| job.current.load(Ordering::SeqCst) == 1);
        service.add_to_queue(1, Utc::now());
        service.add_to_queue(1, Utc::now());

        assert_eq!(service.remove_process(1), 2);
        assert!(service.data_manager().find(1).is_none());
        // unknown from now on
        service.add_to_queue(1, Utc::now());

        job.release(10);
        assert!(rx.recv_timeout(TIMEOUT).unwrap().success);
        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());

        let statuses = service.logger().get_logs(1, 0, 10).unwrap().into_iter().map(|l| l.register.status).collect::<Vec<_>>();
        assert_eq!(statuses, vec![Status::NotExecuted, Status::NotExecuted, Status::Done]);
        wait_until(|| service.status().queue.active.is_empty());
    }

    #[test]
    fn test_job_failures_are_contained() {
        let (_runtime, service) = service(OutcomeJob, 2);
        let rx = finished(&service);
        let (etx, erx) = mpsc::channel();
        ChannelEvent::channel(service.channel(), ChannelOptions::default()).on_error(move |f| {
            let _ = etx.send(f.process_id);
        });
        for id in 1..=4 {
            service.add_process(Process::new(id, INSTANCE)).unwrap();
        }
        service.launch();

        let logger = service.logger();
        let run = |id| {
            service.add_to_queue(id, Utc::now());
            let finished = rx.recv_timeout(TIMEOUT).unwrap();
            assert_eq!(finished.process_id, id);
            (finished, logger.get_logs(id, 0, 0).unwrap().remove(0))
        };

        let (finished, log) = run(1);
        assert!(!finished.success);
        assert_eq!(log.register.status, Status::Error);
        assert!(log.register.data_timestamp.is_some());
        assert_eq!(log.messages[0].message_type, MessageType::Error);
        assert_eq!(log.messages[0].description, "boom");

        let (finished, log) = run(2);
        assert!(!finished.success);
        assert_eq!(log.register.status, Status::Error);
        assert!(log.messages[0].description.contains("job exploded"));

        let (finished, log) = run(3);
        assert!(finished.success);
        assert!(!finished.is_automatic());
        assert_eq!(log.register.status, Status::Done);
        assert_eq!(log.register.data_timestamp, None);
        assert_eq!(log.messages[0].message_type, MessageType::Warning);
        assert_eq!(log.messages[0].description, "No data available");

        let (finished, log) = run(4);
        assert!(finished.success);
        assert!(finished.is_automatic());
        assert_eq!(finished.extra_info[tags::PROCESS_ID], serde_json::json!(4));
        assert_eq!(finished.extra_info[tags::RESULT], serde_json::json!(true));
        assert_eq!(finished.extra_info["files"], serde_json::json!(1));
        assert_eq!(log.register.status, Status::Done);
        let values = log.register.values().unwrap();
        assert_eq!(values["files"], vec!["a.tif"]);
        assert!(values.contains_key("processing_start_time"));
        assert!(values.contains_key("processing_end_time"));

        assert_eq!(erx.recv_timeout(TIMEOUT).unwrap(), 1);
        assert_eq!(erx.recv_timeout(TIMEOUT).unwrap(), 2);
        assert!(service.status().running);
    }

    #[test]
    fn test_foreign_and_unknown_processes_are_ignored() {
        let (_runtime, service) = service(GateJob::open(), 1);
        service.add_process(Process::new(1, INSTANCE + 1)).unwrap();
        service.launch();

        service.add_to_queue(1, Utc::now());
        service.add_to_queue(99, Utc::now());

        let logger = service.logger();
        assert!(logger.get_logs(1, 0, 10).unwrap().is_empty());
        assert!(logger.get_logs(99, 0, 10).unwrap().is_empty());
        assert!(service.status().queue.active.is_empty());
    }

    #[test]
    fn test_scheduled_process_runs_from_timer() {
        let (_runtime, service) = service(GateJob::open(), 1);
        let rx = finished(&service);
        service.launch();

        service.add_process(Process::new(5, INSTANCE).with_schedule(Schedule::new(1, "h"))).unwrap();
        assert_eq!(service.status().timers, 1);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap().process_id, 5);

        // inactive or foreign processes get no timer
        let mut inactive = Process::new(6, INSTANCE).with_schedule(Schedule::new(1, "h"));
        inactive.active = false;
        service.add_process(inactive).unwrap();
        service.add_process(Process::new(7, INSTANCE + 1).with_schedule(Schedule::new(1, "h"))).unwrap();
        assert_eq!(service.status().timers, 1);

        service.remove_process(5);
        assert_eq!(service.status().timers, 0);

        let bad = Process::new(8, INSTANCE).with_schedule(Schedule::new(0, "h"));
        assert!(matches!(service.add_process(bad), Err(ProcflowError::Config(_))));
    }

    #[test]
    fn test_timer_ticks_wait_for_launch() {
        let (_runtime, service) = service(GateJob::open(), 1);
        let rx = finished(&service);
        service.add_process(Process::new(5, INSTANCE).with_schedule(Schedule::new(1, "h"))).unwrap();

        wait_until(|| service.status().triggers == 1);
        assert!(service.logger().get_logs(5, 0, 10).unwrap().is_empty());

        service.launch();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap().process_id, 5);
        assert_eq!(service.status().triggers, 0);
    }

    #[test]
    fn test_update_process_replaces_definition() {
        let (_runtime, service) = service(GateJob::open(), 1);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.update_process(Process::new(1, INSTANCE + 1)).unwrap();
        service.launch();

        service.add_to_queue(1, Utc::now());
        assert!(service.logger().get_logs(1, 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_reprocessing_queues_one_run_per_period() {
        let job = GateJob::open();
        let (_runtime, service) = service(job.clone(), 2);
        let rx = finished(&service);
        service.add_process(Process::new(1, INSTANCE)).unwrap();
        service.launch();

        let begin = Utc.with_ymd_and_hms(2016, 11, 25, 0, 0, 0).unwrap();
        let end = begin + TimeDelta::hours(3);
        assert_eq!(service.add_reprocessing(1, end, begin, &Schedule::new(1, "hour")).unwrap(), 4);

        let dates = (0..4).map(|_| rx.recv_timeout(TIMEOUT).unwrap().execution_date).collect::<Vec<_>>();
        assert_eq!(dates, (0..4).map(|h| begin + TimeDelta::hours(h)).collect::<Vec<_>>());
        assert_eq!(job.max.load(Ordering::SeqCst), 1);

        assert!(service.add_reprocessing(1, begin, end, &Schedule::new(1, "fortnight")).is_err());
    }

    #[test]
    fn test_update_number_of_threads() {
        let job = GateJob::closed();
        let (_runtime, service) = service(job.clone(), 1);
        let rx = finished(&service);
        for id in 1..=3 {
            service.add_process(Process::new(id, INSTANCE)).unwrap();
        }
        service.launch();

        for id in 1..=3 {
            service.add_to_queue(id, Utc::now());
        }
        wait_until(|| job.current.load(Ordering::SeqCst) == 1);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(job.current.load(Ordering::SeqCst), 1);

        service.update_number_of_threads(3);
        assert_eq!(service.status().threads, 3);
        wait_until(|| job.current.load(Ordering::SeqCst) == 3);

        job.release(3);
        for _ in 0..3 {
            rx.recv_timeout(TIMEOUT).unwrap();
        }

        service.update_number_of_threads(0);
        assert!(service.status().threads >= 1);
    }

    #[test]
    fn test_stop() {
        let (_runtime, service) = service(GateJob::open(), 1);
        service.add_process(Process::new(1, INSTANCE).with_schedule(Schedule::new(1, "day"))).unwrap();
        service.launch();
        assert!(service.status().running);

        service.stop();
        let status = service.status();
        assert!(!status.running);
        assert_eq!(status.timers, 0);

        service.launch();
        assert!(!service.status().running);
    }
}
