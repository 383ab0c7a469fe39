use chrono::{DateTime, Utc};
use sea_query::{
    Alias as SeaAlias, ColumnDef, Expr as SeaExpr, Func as SeaFunc, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table, Value, Values,
};
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::{Row, postgres::PgRow};
use tracing::trace;

use crate::{
    Result,
    model::ProcessId,
    store::{
        LogTable,
        data::{ProcessRegister, RegisterId, Status},
        db::postgres::{DbRow, from_db_id, to_db_id},
        map_db_err,
    },
};

use super::{DbConnection, RegisterIden};

const COLUMNS: [RegisterIden; 7] = [
    RegisterIden::Id,
    RegisterIden::ProcessId,
    RegisterIden::Status,
    RegisterIden::StartTimestamp,
    RegisterIden::DataTimestamp,
    RegisterIden::LastProcessTimestamp,
    RegisterIden::Data,
];

/// Rows of the process table, one per execution attempt.
#[derive(Debug)]
pub struct RegisterCollection {
    conn: DbConnection,
}

impl RegisterCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }

    pub fn init_sql(table: &LogTable) -> Vec<String> {
        vec![
            Table::create()
                .table(SeaAlias::new(table.process()))
                .if_not_exists()
                .col(ColumnDef::new(RegisterIden::Id).integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new(RegisterIden::ProcessId).integer().not_null())
                .col(ColumnDef::new(RegisterIden::Status).integer().not_null())
                .col(ColumnDef::new(RegisterIden::StartTimestamp).timestamp_with_time_zone().not_null())
                .col(ColumnDef::new(RegisterIden::DataTimestamp).timestamp_with_time_zone().null())
                .col(ColumnDef::new(RegisterIden::LastProcessTimestamp).timestamp_with_time_zone().not_null())
                .col(ColumnDef::new(RegisterIden::Data).text())
                .build(PostgresQueryBuilder),
            Index::create()
                .name(format!("{}_pid_idx", table.process()))
                .if_not_exists()
                .table(SeaAlias::new(table.process()))
                .col(RegisterIden::ProcessId)
                .build(PostgresQueryBuilder),
            Index::create()
                .name(format!("{}_status_idx", table.process()))
                .if_not_exists()
                .table(SeaAlias::new(table.process()))
                .col(RegisterIden::Status)
                .build(PostgresQueryBuilder),
        ]
    }

    pub fn exists(
        &self,
        table: &LogTable,
        id: RegisterId,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::select()
            .from(SeaAlias::new(table.process()))
            .expr(SeaFunc::count(SeaExpr::col(RegisterIden::Id)))
            .and_where(SeaExpr::col(RegisterIden::Id).eq(to_db_id(id)?))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    pub fn insert(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<RegisterId> {
        let (sql, values) = SeaQuery::insert()
            .into_table(SeaAlias::new(table.process()))
            .columns([RegisterIden::ProcessId, RegisterIden::Status, RegisterIden::StartTimestamp, RegisterIden::LastProcessTimestamp])
            .values([to_db_id(process_id)?.into(), status.code().into(), now.into(), now.into()])
            .map_err(map_db_err)?
            .returning_col(RegisterIden::Id)
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(sql.as_str(), values).map_err(map_db_err)?;
        from_db_id(row.try_get::<i32, usize>(0).map_err(map_db_err)?)
    }

    pub fn update_result(
        &self,
        table: &LogTable,
        id: RegisterId,
        status: Status,
        data_timestamp: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let (sql, values) = SeaQuery::update()
            .table(SeaAlias::new(table.process()))
            .values([
                (RegisterIden::Status, status.code().into()),
                (RegisterIden::DataTimestamp, data_timestamp.into()),
                (RegisterIden::LastProcessTimestamp, now.into()),
            ])
            .and_where(SeaExpr::col(RegisterIden::Id).eq(to_db_id(id)?))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Single statement merge so concurrent callers on the same row serialize on the row lock.
    pub fn append_value(
        &self,
        table: &LogTable,
        id: RegisterId,
        tag: &str,
        value: &str,
    ) -> Result<bool> {
        let sql = format!(
            r#"UPDATE "{table}" SET "data" = jsonb_set(
                CASE WHEN jsonb_typeof(NULLIF("data", '')::jsonb) = 'object' THEN NULLIF("data", '')::jsonb ELSE '{{}}'::jsonb END,
                ARRAY[$1::text],
                CASE WHEN jsonb_typeof(NULLIF("data", '')::jsonb -> $1::text) = 'array' THEN NULLIF("data", '')::jsonb -> $1::text ELSE '[]'::jsonb END
                    || to_jsonb($2::text)
            )::text WHERE "id" = $3"#,
            table = table.process()
        );
        let values = SqlxValues(Values(vec![Value::from(tag), Value::from(value), Value::from(to_db_id(id)?)]));

        trace!("append_value({}, {}, {})", table.process(), id, tag);
        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    pub fn max_timestamp(
        &self,
        table: &LogTable,
        column: RegisterIden,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>> {
        let (sql, values) = SeaQuery::select()
            .from(SeaAlias::new(table.process()))
            .expr(SeaFunc::max(SeaExpr::col(column)))
            .and_where(SeaExpr::col(RegisterIden::ProcessId).eq(to_db_id(process_id)?))
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(sql.as_str(), values).map_err(map_db_err)?;
        row.try_get::<Option<DateTime<Utc>>, usize>(0).map_err(map_db_err)
    }

    pub fn page(
        &self,
        table: &LogTable,
        process_id: ProcessId,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<ProcessRegister>> {
        let (sql, values) = SeaQuery::select()
            .columns(COLUMNS)
            .from(SeaAlias::new(table.process()))
            .and_where(SeaExpr::col(RegisterIden::ProcessId).eq(to_db_id(process_id)?))
            .order_by(RegisterIden::Id, SeaOrder::Desc)
            .limit(limit.min(i64::MAX as u64))
            .offset(offset.min(i64::MAX as u64))
            .build_sqlx(PostgresQueryBuilder);

        self.conn.query(sql.as_str(), values).map_err(map_db_err)?.iter().map(ProcessRegister::from_row).collect()
    }

    pub fn update_status(
        &self,
        table: &LogTable,
        from: &[Status],
        to: Status,
    ) -> Result<u64> {
        if from.is_empty() {
            return Ok(0);
        }

        let (sql, values) = SeaQuery::update()
            .table(SeaAlias::new(table.process()))
            .values([(RegisterIden::Status, to.code().into())])
            .and_where(SeaExpr::col(RegisterIden::Status).is_in(from.iter().map(|s| s.code())))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected())
    }
}

impl DbRow for ProcessRegister {
    fn from_row(row: &PgRow) -> Result<Self>
    where
        Self: Sized,
    {
        Ok(Self {
            id: from_db_id(row.try_get("id").map_err(map_db_err)?)?,
            process_id: from_db_id(row.try_get("process_id").map_err(map_db_err)?)?,
            status: Status::from_code(row.try_get("status").map_err(map_db_err)?)?,
            start_timestamp: row.try_get("start_timestamp").map_err(map_db_err)?,
            data_timestamp: row.try_get("data_timestamp").map_err(map_db_err)?,
            last_process_timestamp: row.try_get("last_process_timestamp").map_err(map_db_err)?,
            data: row.try_get("data").map_err(map_db_err)?,
        })
    }
}
