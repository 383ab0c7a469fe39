//! Storage layer for the process log.
//!
//! Provides an abstraction over different storage backends:
//! - `MemStore`: In-memory storage for testing and embedding
//! - `PostgresStore`: PostgreSQL for production persistence
//!
//! `ProcessLogger` is the only consumer of the backends and the public entry
//! point of this module.

pub mod data;
mod db;
mod logger;

use std::{error::Error, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;

use crate::{ProcflowError, Result, StoreConfig, StoreType, model::ProcessId};

use data::{MessageRegister, MessageType, ProcessRegister, RegisterId, Status};

pub use db::{MemStore, PostgresStore};
pub use logger::{PROCESSING_END_TIME, PROCESSING_START_TIME, ProcessLogger};

/// Longest accepted base table name, leaves room for the `_messages` suffix
/// within the 63 bytes PostgreSQL allows for identifiers.
const MAX_TABLE_NAME_LEN: usize = 54;

/// Maps database errors to ProcflowError.
fn map_db_err(err: impl Error) -> ProcflowError {
    ProcflowError::Store(err.to_string())
}

/// Names of the table pair holding a process log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogTable {
    process: String,
    messages: String,
}

impl LogTable {
    /// Builds the table pair from a base name.
    ///
    /// The name is lower-cased and must be a plain SQL identifier, it is the
    /// only part of a statement not passed as a bound parameter.
    pub fn new(name: &str) -> Result<Self> {
        let name = name.trim().to_lowercase();

        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid_start || !valid_rest || name.len() > MAX_TABLE_NAME_LEN {
            return Err(ProcflowError::Config(format!("invalid log table name: '{}'", name)));
        }

        Ok(Self {
            messages: format!("{}_messages", name),
            process: name,
        })
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn messages(&self) -> &str {
        &self.messages
    }
}

/// Backend operations needed by the process log.
///
/// Every call is a self-contained statement, implementations must not keep
/// state between calls other than the stored rows.
pub trait DbStore: Send + Sync {
    /// Creates the process and message tables if absent.
    fn init(
        &self,
        table: &LogTable,
    ) -> Result<()>;

    /// Inserts a new register and returns its id.
    fn insert_register(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<RegisterId>;

    /// Writes the status and data timestamp of a register, returns false if it does not exist.
    fn update_result(
        &self,
        table: &LogTable,
        id: RegisterId,
        status: Status,
        data_timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Appends a message to a register, returns `None` if the register does not exist.
    fn insert_message(
        &self,
        table: &LogTable,
        log_id: RegisterId,
        message_type: MessageType,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>>;

    /// Atomically appends `value` to the `tag` array of the register data,
    /// returns false if the register does not exist.
    fn append_value(
        &self,
        table: &LogTable,
        id: RegisterId,
        tag: &str,
        value: &str,
    ) -> Result<bool>;

    fn max_last_process_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>>;

    fn max_data_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Registers of a process, most recent first.
    fn registers(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProcessRegister>>;

    /// Messages of the given registers, in insertion order.
    fn messages(
        &self,
        table: &LogTable,
        log_ids: &[RegisterId],
    ) -> Result<Vec<MessageRegister>>;

    /// Moves every register in one of the `from` statuses to `to`, returns the number of rows changed.
    fn update_status(
        &self,
        table: &LogTable,
        from: &[Status],
        to: Status,
    ) -> Result<u64>;
}

/// Opens the backend selected by the store configuration.
pub fn connect(
    config: &StoreConfig,
    runtime: Arc<Runtime>,
) -> Result<Arc<dyn DbStore>> {
    match config.store_type {
        StoreType::Mem => Ok(Arc::new(MemStore::new())),
        StoreType::Postgres => {
            let postgres = config
                .postgres
                .as_ref()
                .ok_or_else(|| ProcflowError::Config("Postgres configuration is required when store type is Postgres".to_string()))?;
            Ok(Arc::new(PostgresStore::new(postgres, runtime)?))
        }
    }
}

#[cfg(test)]
mod test {
    use super::LogTable;

    #[test]
    fn test_log_table_name() {
        let table = LogTable::new("Analysis_3").unwrap();
        assert_eq!(table.process(), "analysis_3");
        assert_eq!(table.messages(), "analysis_3_messages");

        assert!(LogTable::new("").is_err());
        assert!(LogTable::new("3analysis").is_err());
        assert!(LogTable::new("analysis; drop table x").is_err());
        assert!(LogTable::new("analysis\"").is_err());
        assert!(LogTable::new(&"a".repeat(55)).is_err());
    }
}
