use chrono::{DateTime, Utc};
use sea_query::{Alias as SeaAlias, ColumnDef, Expr as SeaExpr, ForeignKey, Index, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, postgres::PgRow};

use crate::{
    Result,
    store::{
        LogTable,
        data::{MessageRegister, MessageType, RegisterId},
        db::postgres::{DbRow, from_db_id, to_db_id},
        map_db_err,
    },
};

use super::{DbConnection, MessageIden, RegisterIden};

/// Rows of the message table, attached to a process register.
#[derive(Debug)]
pub struct MessageCollection {
    conn: DbConnection,
}

impl MessageCollection {
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
        }
    }

    pub fn init_sql(table: &LogTable) -> Vec<String> {
        vec![
            Table::create()
                .table(SeaAlias::new(table.messages()))
                .if_not_exists()
                .col(ColumnDef::new(MessageIden::Id).integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new(MessageIden::LogId).integer().not_null())
                .col(ColumnDef::new(MessageIden::Type).integer().not_null())
                .col(ColumnDef::new(MessageIden::Description).text())
                .col(ColumnDef::new(MessageIden::Timestamp).timestamp_with_time_zone().not_null())
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("{}_log_fk", table.process()))
                        .from(SeaAlias::new(table.messages()), MessageIden::LogId)
                        .to(SeaAlias::new(table.process()), RegisterIden::Id),
                )
                .build(PostgresQueryBuilder),
            Index::create()
                .name(format!("{}_log_idx", table.messages()))
                .if_not_exists()
                .table(SeaAlias::new(table.messages()))
                .col(MessageIden::LogId)
                .build(PostgresQueryBuilder),
        ]
    }

    pub fn insert(
        &self,
        table: &LogTable,
        log_id: RegisterId,
        message_type: MessageType,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let (sql, values) = SeaQuery::insert()
            .into_table(SeaAlias::new(table.messages()))
            .columns([MessageIden::LogId, MessageIden::Type, MessageIden::Description, MessageIden::Timestamp])
            .values([to_db_id(log_id)?.into(), message_type.code().into(), description.into(), now.into()])
            .map_err(map_db_err)?
            .returning_col(MessageIden::Id)
            .build_sqlx(PostgresQueryBuilder);

        let row = self.conn.query_one(sql.as_str(), values).map_err(map_db_err)?;
        from_db_id(row.try_get::<i32, usize>(0).map_err(map_db_err)?)
    }

    pub fn find_by_logs(
        &self,
        table: &LogTable,
        log_ids: &[RegisterId],
    ) -> Result<Vec<MessageRegister>> {
        if log_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = log_ids.iter().map(|id| to_db_id(*id)).collect::<Result<Vec<_>>>()?;
        let (sql, values) = SeaQuery::select()
            .columns([MessageIden::Id, MessageIden::LogId, MessageIden::Type, MessageIden::Description, MessageIden::Timestamp])
            .from(SeaAlias::new(table.messages()))
            .and_where(SeaExpr::col(MessageIden::LogId).is_in(ids))
            .order_by(MessageIden::Id, SeaOrder::Asc)
            .build_sqlx(PostgresQueryBuilder);

        self.conn.query(sql.as_str(), values).map_err(map_db_err)?.iter().map(MessageRegister::from_row).collect()
    }
}

impl DbRow for MessageRegister {
    fn from_row(row: &PgRow) -> Result<Self>
    where
        Self: Sized,
    {
        Ok(Self {
            id: from_db_id(row.try_get("id").map_err(map_db_err)?)?,
            log_id: from_db_id(row.try_get("log_id").map_err(map_db_err)?)?,
            message_type: MessageType::from_code(row.try_get("type").map_err(map_db_err)?)?,
            description: row.try_get::<Option<String>, _>("description").map_err(map_db_err)?.unwrap_or_default(),
            timestamp: row.try_get("timestamp").map_err(map_db_err)?,
        })
    }
}
