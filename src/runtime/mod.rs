mod channel;
mod context;
mod job;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::{JobContext, ServiceContext};
pub use job::{ExecutionPackage, Job, JobOutcome};
