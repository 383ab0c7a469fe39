mod message;
mod register;

use std::sync::Arc;

use sea_query::Iden;

pub use message::MessageCollection;
pub use register::RegisterCollection;

use super::synclient::SynClient;

pub type DbConnection = Arc<SynClient>;

#[derive(Iden, Clone, Copy)]
pub enum RegisterIden {
    Id,
    ProcessId,
    Status,
    StartTimestamp,
    DataTimestamp,
    LastProcessTimestamp,
    Data,
}

#[derive(Iden, Clone, Copy)]
pub enum MessageIden {
    Id,
    LogId,
    Type,
    Description,
    Timestamp,
}
