use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

use crate::{ProcflowError, Result};

/// Execution status of a process register.
///
/// The integer codes are persisted and shared with other services reading the
/// same tables, they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Error = 1,
    Start = 2,
    Downloaded = 3,
    Done = 4,
    OnQueue = 5,
    Interrupted = 6,
    NotExecuted = 7,
    Warning = 8,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            1 => Status::Error,
            2 => Status::Start,
            3 => Status::Downloaded,
            4 => Status::Done,
            5 => Status::OnQueue,
            6 => Status::Interrupted,
            7 => Status::NotExecuted,
            8 => Status::Warning,
            _ => return Err(ProcflowError::Convert(format!("unknown process status code: {}", code))),
        })
    }
}

/// Kind of a message attached to a process register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Error = 1,
    Info = 2,
    Warning = 3,
}

impl MessageType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            1 => MessageType::Error,
            2 => MessageType::Info,
            3 => MessageType::Warning,
            _ => return Err(ProcflowError::Convert(format!("unknown message type code: {}", code))),
        })
    }
}
