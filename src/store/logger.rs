//! Durable bookkeeping of process executions.
//!
//! A `ProcessLogger` writes one register per execution attempt of a process,
//! plus any number of messages attached to it, into a pair of tables named
//! after the owning service (`analysis_3`, `analysis_3_messages`).

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info};

use crate::{
    ProcflowError, Result,
    model::ProcessId,
    store::{
        DbStore, LogTable,
        data::{MessageType, ProcessLog, RegisterId, Status},
    },
    utils,
};

/// Tag under which the job start time is stored in the register data.
pub const PROCESSING_START_TIME: &str = "processing_start_time";
/// Tag under which the job end time is stored in the register data.
pub const PROCESSING_END_TIME: &str = "processing_end_time";

/// Process log over a storage backend.
///
/// Cloning is cheap: the clone shares the backend handle and keeps its own
/// copy of the table name, so later `set_table_name` calls on the original
/// never affect a clone already handed to a running job.
#[derive(Clone)]
pub struct ProcessLogger {
    db: Arc<dyn DbStore>,
    table: Option<LogTable>,
}

impl ProcessLogger {
    /// Creates a logger without tables, every operation fails until `set_table_name` succeeds.
    pub fn new(db: Arc<dyn DbStore>) -> Self {
        Self {
            db,
            table: None,
        }
    }

    /// Creates a logger and provisions its tables in one step.
    pub fn with_table_name(
        db: Arc<dyn DbStore>,
        name: &str,
    ) -> Result<Self> {
        let mut logger = Self::new(db);
        logger.set_table_name(name)?;
        Ok(logger)
    }

    /// Selects the log tables, creating them if absent, and repairs registers
    /// left behind by a previous run of the service.
    pub fn set_table_name(
        &mut self,
        name: &str,
    ) -> Result<()> {
        let table = LogTable::new(name)?;
        self.db.init(&table)?;
        self.table = Some(table);

        self.repair()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_ref().map(|t| t.process())
    }

    pub fn is_valid(&self) -> bool {
        self.table.is_some()
    }

    /// Opens a new register for `process_id` in status START.
    pub fn start(
        &self,
        process_id: ProcessId,
    ) -> Result<RegisterId> {
        let table = self.table()?;
        let id = self.db.insert_register(table, process_id, Status::Start, utils::time::now())?;
        debug!(process_id, register_id = id, "process started");
        Ok(id)
    }

    /// Writes the status of a register. A `None` data timestamp is stored as NULL.
    pub fn result(
        &self,
        status: Status,
        data_timestamp: Option<DateTime<Utc>>,
        register_id: RegisterId,
    ) -> Result<()> {
        let table = self.table()?;
        if !self.db.update_result(table, register_id, status, data_timestamp, utils::time::now())? {
            return Err(unknown_register(table, register_id));
        }
        debug!(register_id, status = status.as_ref(), "process result");
        Ok(())
    }

    /// Attaches a message to a register.
    pub fn log(
        &self,
        message_type: MessageType,
        description: &str,
        register_id: RegisterId,
    ) -> Result<()> {
        let table = self.table()?;
        let description = sanitize(description);
        match self.db.insert_message(table, register_id, message_type, &description, utils::time::now())? {
            Some(_) => Ok(()),
            None => Err(unknown_register(table, register_id)),
        }
    }

    /// Appends `value` to the list stored under `tag` in the register data.
    pub fn add_value(
        &self,
        tag: &str,
        value: &str,
        register_id: RegisterId,
    ) -> Result<()> {
        let table = self.table()?;
        if !self.db.append_value(table, register_id, tag, &sanitize(value))? {
            return Err(unknown_register(table, register_id));
        }
        Ok(())
    }

    pub fn set_start_processing_time(
        &self,
        time: DateTime<Utc>,
        register_id: RegisterId,
    ) -> Result<()> {
        self.add_value(PROCESSING_START_TIME, &time.to_rfc3339_opts(SecondsFormat::Millis, true), register_id)
    }

    pub fn set_end_processing_time(
        &self,
        time: DateTime<Utc>,
        register_id: RegisterId,
    ) -> Result<()> {
        self.add_value(PROCESSING_END_TIME, &time.to_rfc3339_opts(SecondsFormat::Millis, true), register_id)
    }

    /// Most recent `last_process_timestamp` of the process, `None` if it never ran.
    pub fn get_last_process_timestamp(
        &self,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.db.max_last_process_timestamp(self.table()?, process_id)
    }

    /// Most recent data timestamp of the process, `None` if no run produced data.
    pub fn get_data_last_timestamp(
        &self,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.db.max_data_timestamp(self.table()?, process_id)
    }

    /// Page of registers with their messages, `begin = 0` being the most recent one.
    ///
    /// Both bounds are inclusive and swapped when `begin > end`.
    pub fn get_logs(
        &self,
        process_id: ProcessId,
        begin: u64,
        end: u64,
    ) -> Result<Vec<ProcessLog>> {
        let table = self.table()?;
        let (begin, end) = if begin > end {
            (end, begin)
        } else {
            (begin, end)
        };

        let registers = self.db.registers(table, process_id, begin, end.saturating_sub(begin).saturating_add(1))?;
        let ids = registers.iter().map(|r| r.id).collect::<Vec<_>>();
        let mut messages = self.db.messages(table, &ids)?;

        Ok(registers
            .into_iter()
            .map(|register| {
                let (own, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut messages).into_iter().partition(|m| m.log_id == register.id);
                messages = rest;
                ProcessLog {
                    register,
                    messages: own,
                }
            })
            .collect())
    }

    /// Moves every register in one of `old_statuses` to `new_status`.
    pub fn update_status(
        &self,
        old_statuses: &[Status],
        new_status: Status,
    ) -> Result<u64> {
        self.db.update_status(self.table()?, old_statuses, new_status)
    }

    /// A register still in START was running when the service stopped, one
    /// still ON_QUEUE was never dispatched.
    fn repair(&self) -> Result<()> {
        let interrupted = self.update_status(&[Status::Start], Status::Interrupted)?;
        let not_executed = self.update_status(&[Status::OnQueue], Status::NotExecuted)?;
        if interrupted > 0 || not_executed > 0 {
            info!(
                table = self.table_name().unwrap_or_default(),
                interrupted, not_executed, "repaired process log left by a previous run"
            );
        }
        Ok(())
    }

    fn table(&self) -> Result<&LogTable> {
        match self.table.as_ref() {
            Some(table) => Ok(table),
            None => {
                let msg = "Can not find log table name. Is it set?";
                error!("{}", msg);
                Err(ProcflowError::Log(msg.to_string()))
            }
        }
    }
}

fn unknown_register(
    table: &LogTable,
    register_id: RegisterId,
) -> ProcflowError {
    ProcflowError::Log(format!("register {} not found in {}", register_id, table.process()))
}

/// Text is always sent as a bound parameter, only NUL bytes need to go
/// since PostgreSQL text columns reject them.
fn sanitize(text: &str) -> String {
    text.replace('\0', "")
}
