use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::{
    PostgresConfig, Result,
    model::ProcessId,
    store::{
        DbStore, LogTable,
        data::{MessageRegister, MessageType, ProcessRegister, RegisterId, Status},
        map_db_err,
    },
};

use super::{
    collection::{MessageCollection, RegisterCollection, RegisterIden},
    synclient::SynClient,
};

/// PostgreSQL process log backend.
pub struct PostgresStore {
    conn: Arc<SynClient>,
    registers: RegisterCollection,
    messages: MessageCollection,
}

impl PostgresStore {
    pub fn new(
        config: &PostgresConfig,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let conn = Arc::new(SynClient::connect(config, runtime)?);
        let registers = RegisterCollection::new(&conn);
        let messages = MessageCollection::new(&conn);

        Ok(Self {
            conn,
            registers,
            messages,
        })
    }
}

impl DbStore for PostgresStore {
    fn init(
        &self,
        table: &LogTable,
    ) -> Result<()> {
        debug!("creating log tables {} and {}", table.process(), table.messages());
        let mut sql = RegisterCollection::init_sql(table);
        sql.extend(MessageCollection::init_sql(table));
        self.conn.batch_execute(&sql).map_err(map_db_err)
    }

    fn insert_register(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<RegisterId> {
        self.registers.insert(table, process_id, status, now)
    }

    fn update_result(
        &self,
        table: &LogTable,
        id: RegisterId,
        status: Status,
        data_timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.registers.update_result(table, id, status, data_timestamp, now)
    }

    fn insert_message(
        &self,
        table: &LogTable,
        log_id: RegisterId,
        message_type: MessageType,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        // registers are never deleted, checking first is enough to avoid the FK violation
        if !self.registers.exists(table, log_id)? {
            return Ok(None);
        }
        self.messages.insert(table, log_id, message_type, description, now).map(Some)
    }

    fn append_value(
        &self,
        table: &LogTable,
        id: RegisterId,
        tag: &str,
        value: &str,
    ) -> Result<bool> {
        self.registers.append_value(table, id, tag, value)
    }

    fn max_last_process_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.registers.max_timestamp(table, RegisterIden::LastProcessTimestamp, process_id)
    }

    fn max_data_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.registers.max_timestamp(table, RegisterIden::DataTimestamp, process_id)
    }

    fn registers(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProcessRegister>> {
        self.registers.page(table, process_id, offset, limit)
    }

    fn messages(
        &self,
        table: &LogTable,
        log_ids: &[RegisterId],
    ) -> Result<Vec<MessageRegister>> {
        self.messages.find_by_logs(table, log_ids)
    }

    fn update_status(
        &self,
        table: &LogTable,
        from: &[Status],
        to: Status,
    ) -> Result<u64> {
        self.registers.update_status(table, from, to)
    }
}
