mod register;
mod status;

pub(crate) use register::merge_value;
pub use register::{MessageRegister, ProcessLog, ProcessRegister, RegisterId};
pub use status::{MessageType, Status};
