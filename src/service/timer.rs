use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    runtime::Runtime,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    ProcflowError, Result,
    model::{ProcessId, Schedule},
    utils,
};

/// Periodic trigger of one process.
///
/// The first tick fires right away when the process never ran or its
/// period already elapsed since the last run, otherwise one period after
/// the last run. A late tick delays the following ones instead of bursting.
/// Dropping the timer cancels it.
pub struct Timer {
    process_id: ProcessId,
    period: Duration,
    handle: JoinHandle<()>,
}

impl Timer {
    pub fn new<F, Fut>(
        schedule: &Schedule,
        process_id: ProcessId,
        last_process: Option<DateTime<Utc>>,
        runtime: &Arc<Runtime>,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(ProcessId, DateTime<Utc>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = schedule.period()?;
        let delay = match last_process {
            Some(last) => {
                let next = last + TimeDelta::from_std(period).map_err(|e| ProcflowError::Convert(e.to_string()))?;
                // negative when the period already elapsed
                (next - Utc::now()).to_std().unwrap_or(Duration::ZERO)
            }
            None => Duration::ZERO,
        };
        debug!(process_id, ?period, ?delay, "starting timer");

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                callback(process_id, utils::time::now()).await;
            }
        });

        Ok(Self {
            process_id,
            period,
            handle,
        })
    }

    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, mpsc},
        thread,
        time::Duration,
    };

    use chrono::{TimeDelta, Utc};
    use tokio::runtime::Builder;

    use super::Timer;
    use crate::{ProcflowError, model::Schedule};

    fn runtime() -> Arc<tokio::runtime::Runtime> {
        Arc::new(Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap())
    }

    #[test]
    fn test_fires_immediately_without_history() {
        let runtime = runtime();
        let (tx, rx) = mpsc::channel();
        let _timer = Timer::new(&Schedule::new(1, "hour"), 7, None, &runtime, move |pid, date| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((pid, date));
            }
        })
        .unwrap();

        let (pid, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(pid, 7);
        // next tick is an hour away
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_fires_immediately_when_period_elapsed() {
        let runtime = runtime();
        let (tx, rx) = mpsc::channel();
        let last = Utc::now() - TimeDelta::hours(2);
        let _timer = Timer::new(&Schedule::new(1, "h"), 7, Some(last), &runtime, move |pid, _| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(pid);
            }
        })
        .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 7);
    }

    #[test]
    fn test_waits_for_next_period() {
        let runtime = runtime();
        let (tx, rx) = mpsc::channel();
        let timer = Timer::new(&Schedule::new(1, "day"), 7, Some(Utc::now()), &runtime, move |pid, _| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(pid);
            }
        })
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert!(timer.is_running());
        assert_eq!(timer.period(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_stop() {
        let runtime = runtime();
        let timer = Timer::new(&Schedule::new(1, "s"), 7, None, &runtime, |_, _| async {}).unwrap();
        timer.stop();
        for _ in 0..50 {
            if !timer.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!timer.is_running());
    }

    #[test]
    fn test_invalid_schedule() {
        let runtime = runtime();
        let result = Timer::new(&Schedule::new(0, "s"), 7, None, &runtime, |_, _| async {});
        assert!(matches!(result, Err(ProcflowError::Config(_))));
        let result = Timer::new(&Schedule::new(5, "fortnight"), 7, None, &runtime, |_, _| async {});
        assert!(matches!(result, Err(ProcflowError::Config(_))));
    }
}
