use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use procflow::{
    ChannelEvent, ChannelOptions, Config, Job, JobContext, JobOutcome, ProcflowError, Process, Result, Schedule, ServiceBuilder,
    store::data::MessageType,
};
use tracing_subscriber::EnvFilter;

/// Fails on odd hours to show how errors end up in the process log.
struct HourlyAnalysis;

#[async_trait]
impl Job for HourlyAnalysis {
    async fn run(
        &self,
        ctx: &JobContext,
    ) -> Result<JobOutcome> {
        let date = ctx.execution_date();
        ctx.log(MessageType::Info, &format!("analysing data of {}", date))?;
        tokio::time::sleep(Duration::from_millis(200)).await;

        if date.timestamp() / 3600 % 2 == 1 {
            return Err(ProcflowError::Job(format!("missing input for {}", date)));
        }
        Ok(JobOutcome::done(Some(date)))
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let config_str = include_str!("./config.toml");

    let config = Config::load_from_str(config_str).unwrap();

    let service = ServiceBuilder::new().config(config).job(HourlyAnalysis).build().unwrap();

    ChannelEvent::channel(service.channel(), ChannelOptions::default()).on_error(move |f| {
        println!("Execution of {} at {} failed", f.process_id, f.execution_date);
    });

    service.launch();

    service.add_process(Process::new(10, 3)).unwrap();

    let end = Utc::now();
    let count = service.add_reprocessing(10, end - TimeDelta::hours(5), end, &Schedule::new(1, "hour")).unwrap();
    println!("Reprocessing {} executions", count);

    std::thread::sleep(Duration::from_secs(3));
    service.stop();

    for log in service.logger().get_logs(10, 0, 9).unwrap() {
        println!(
            "#{} {} data={:?} messages={:?}",
            log.register.id,
            log.register.status.as_ref(),
            log.register.data_timestamp,
            log.messages.iter().map(|m| m.description.as_str()).collect::<Vec<_>>()
        );
    }
}
