use sqlx::postgres::PgRow;

use crate::{ProcflowError, Result};

mod collection;
mod database;
mod synclient;

pub use database::PostgresStore;

pub trait DbRow {
    fn from_row(row: &PgRow) -> Result<Self>
    where
        Self: Sized;
}

/// SERIAL and INT columns are 32 bits wide.
fn to_db_id(id: u64) -> Result<i32> {
    i32::try_from(id).map_err(|_| ProcflowError::Convert(format!("id {} does not fit an INT column", id)))
}

fn from_db_id(id: i32) -> Result<u64> {
    u64::try_from(id).map_err(|_| ProcflowError::Convert(format!("negative id {} read from database", id)))
}
