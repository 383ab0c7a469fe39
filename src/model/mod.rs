mod data_manager;
mod process;
mod schedule;
mod service;

pub use data_manager::DataManager;
pub use process::{Process, ProcessId};
pub use schedule::Schedule;
pub use service::ServiceType;
