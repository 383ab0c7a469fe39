use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};

use crate::{
    ProcflowError, Result, ShareLock,
    model::ProcessId,
    store::{
        DbStore, LogTable,
        data::{MessageRegister, MessageType, ProcessRegister, RegisterId, Status, merge_value},
    },
};

#[derive(Debug, Default)]
struct MemTable {
    last_register_id: RegisterId,
    last_message_id: u64,
    registers: BTreeMap<RegisterId, ProcessRegister>,
    messages: Vec<MessageRegister>,
}

/// In-memory process log backend.
///
/// Mirrors the PostgreSQL semantics: tables must be initialized before use,
/// ids are serial and never reused, and every operation is atomic.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    tables: ShareLock<HashMap<String, MemTable>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn read<R>(
        &self,
        table: &LogTable,
        f: impl FnOnce(&MemTable) -> Result<R>,
    ) -> Result<R> {
        let tables = self.tables.read().unwrap();
        match tables.get(table.process()) {
            Some(t) => f(t),
            None => Err(missing_table(table)),
        }
    }

    fn write<R>(
        &self,
        table: &LogTable,
        f: impl FnOnce(&mut MemTable) -> Result<R>,
    ) -> Result<R> {
        let mut tables = self.tables.write().unwrap();
        match tables.get_mut(table.process()) {
            Some(t) => f(t),
            None => Err(missing_table(table)),
        }
    }
}

fn missing_table(table: &LogTable) -> ProcflowError {
    ProcflowError::Store(format!("relation \"{}\" does not exist", table.process()))
}

impl DbStore for MemStore {
    fn init(
        &self,
        table: &LogTable,
    ) -> Result<()> {
        self.tables.write().unwrap().entry(table.process().to_string()).or_default();
        Ok(())
    }

    fn insert_register(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<RegisterId> {
        self.write(table, |t| {
            t.last_register_id += 1;
            let id = t.last_register_id;
            t.registers.insert(
                id,
                ProcessRegister {
                    id,
                    process_id,
                    status,
                    start_timestamp: now,
                    data_timestamp: None,
                    last_process_timestamp: now,
                    data: None,
                },
            );
            Ok(id)
        })
    }

    fn update_result(
        &self,
        table: &LogTable,
        id: RegisterId,
        status: Status,
        data_timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.write(table, |t| match t.registers.get_mut(&id) {
            Some(register) => {
                register.status = status;
                register.data_timestamp = data_timestamp;
                register.last_process_timestamp = now;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn insert_message(
        &self,
        table: &LogTable,
        log_id: RegisterId,
        message_type: MessageType,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u64>> {
        self.write(table, |t| {
            if !t.registers.contains_key(&log_id) {
                return Ok(None);
            }
            t.last_message_id += 1;
            let id = t.last_message_id;
            t.messages.push(MessageRegister {
                id,
                log_id,
                message_type,
                description: description.to_string(),
                timestamp: now,
            });
            Ok(Some(id))
        })
    }

    fn append_value(
        &self,
        table: &LogTable,
        id: RegisterId,
        tag: &str,
        value: &str,
    ) -> Result<bool> {
        // the table write lock spans the whole read-modify-write
        self.write(table, |t| match t.registers.get_mut(&id) {
            Some(register) => {
                register.data = Some(merge_value(register.data.as_deref(), tag, value)?);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn max_last_process_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.read(table, |t| Ok(t.registers.values().filter(|r| r.process_id == process_id).map(|r| r.last_process_timestamp).max()))
    }

    fn max_data_timestamp(
        &self,
        table: &LogTable,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        self.read(table, |t| Ok(t.registers.values().filter(|r| r.process_id == process_id).filter_map(|r| r.data_timestamp).max()))
    }

    fn registers(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProcessRegister>> {
        self.read(table, |t| {
            Ok(t.registers
                .values()
                .rev()
                .filter(|r| r.process_id == process_id)
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect())
        })
    }

    fn messages(
        &self,
        table: &LogTable,
        log_ids: &[RegisterId],
    ) -> Result<Vec<MessageRegister>> {
        self.read(table, |t| Ok(t.messages.iter().filter(|m| log_ids.contains(&m.log_id)).cloned().collect()))
    }

    fn update_status(
        &self,
        table: &LogTable,
        from: &[Status],
        to: Status,
    ) -> Result<u64> {
        self.write(table, |t| {
            let mut count = 0;
            for register in t.registers.values_mut().filter(|r| from.contains(&r.status)) {
                register.status = to;
                count += 1;
            }
            Ok(count)
        })
    }
}
