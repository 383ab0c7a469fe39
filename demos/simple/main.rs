use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use procflow::{
    ChannelEvent, ChannelOptions, Config, Job, JobContext, JobOutcome, Process, Result, Schedule, ServiceBuilder, ServiceType,
    store::data::MessageType,
};
use tracing_subscriber::EnvFilter;

/// Pretends to download a few files per execution.
struct FileCollector;

#[async_trait]
impl Job for FileCollector {
    async fn run(
        &self,
        ctx: &JobContext,
    ) -> Result<JobOutcome> {
        tokio::time::sleep(Duration::from_millis(500)).await;

        if ctx.process_id() == 2 {
            return Ok(JobOutcome::NoData);
        }

        for i in 0..3 {
            ctx.add_value("files", &format!("file_{}.tif", i))?;
        }
        ctx.log(MessageType::Info, "fetched 3 files")?;
        Ok(JobOutcome::done(Some(ctx.execution_date())))
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let mut config = Config::default();
    config.service.service_type = ServiceType::Collector;
    config.service.instance_id = 1;
    config.worker_thread_number = 2;

    let service = ServiceBuilder::new().config(config).job(FileCollector).build().unwrap();

    ChannelEvent::channel(service.channel(), ChannelOptions::default()).on_finished(move |f| {
        println!("Process {} finished, success: {}, info: {}", f.process_id, f.success, serde_json::to_string(&f.extra_info).unwrap());
    });

    ChannelEvent::channel(service.channel(), ChannelOptions::with_process_id(1)).on_event(move |e| {
        println!("Process 1 register {}: {:?}", e.register_id, e.event);
    });

    service.launch();

    service.add_process(Process::new(1, 1).with_schedule(Schedule::new(2, "s"))).unwrap();
    service.add_process(Process::new(2, 1)).unwrap();

    // a manual trigger while the first run is in progress waits on queue
    std::thread::sleep(Duration::from_millis(100));
    service.add_to_queue(1, Utc::now());
    service.add_to_queue(2, Utc::now());

    std::thread::sleep(Duration::from_secs(5));
    println!("Status: {:#?}", service.status());

    service.stop();

    for log in service.logger().get_logs(1, 0, 9).unwrap() {
        println!(
            "#{} {} start={} data={:?} messages={:?}",
            log.register.id,
            log.register.status.as_ref(),
            log.register.start_timestamp,
            log.register.data_timestamp,
            log.messages.iter().map(|m| m.description.as_str()).collect::<Vec<_>>()
        );
    }
}
