use std::{future::Future, sync::Arc, time::Duration};

use sqlx::{
    Database, Error, IntoArguments, PgPool, Postgres,
    postgres::{PgPoolOptions, PgRow},
};
use tokio::{
    runtime::{Handle, Runtime},
    task::block_in_place,
};

use crate::{PostgresConfig, ProcflowError, Result};

/// Blocking facade over a sqlx pool.
///
/// Each call checks a connection out of the pool for the duration of one
/// statement (or one transaction) and returns it right after. Only a handle
/// of the runtime is kept, so tasks holding the client never own the runtime.
#[derive(Debug, Clone)]
pub struct SynClient {
    pool: PgPool,

    runtime: Handle,
}

impl SynClient {
    pub fn connect(
        config: &PostgresConfig,
        runtime: Arc<Runtime>,
    ) -> Result<Self> {
        let options = PgPoolOptions::new().acquire_timeout(Duration::from_secs(5)).max_connections(config.max_connections);
        let db_url = config.database_url.as_str();

        let runtime = runtime.handle().clone();
        let pool = block_on(&runtime, async move { options.connect(db_url).await })
            .map_err(|e| ProcflowError::Store(format!("failed to connect to DB {}: {}", db_url, e)))?;

        Ok(Self {
            pool,
            runtime,
        })
    }

    pub fn query_one<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<PgRow, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        block_on(&self.runtime, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_one(&mut *conn).await
        })
    }

    pub fn query<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<Vec<PgRow>, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        block_on(&self.runtime, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).fetch_all(&mut *conn).await
        })
    }

    pub fn execute<'q, A>(
        &self,
        sql: &'q str,
        params: A,
    ) -> std::result::Result<<Postgres as Database>::QueryResult, Error>
    where
        A: IntoArguments<'q, Postgres> + 'q,
    {
        block_on(&self.runtime, async move {
            let mut conn = self.pool.acquire().await?;

            sqlx::query_with(sql, params).execute(&mut *conn).await
        })
    }

    pub fn batch_execute(
        &self,
        sqls: &[String],
    ) -> std::result::Result<(), Error> {
        block_on(&self.runtime, async move {
            let mut tx = self.pool.begin().await?;

            for sql in sqls {
                sqlx::query(sql).execute(&mut *tx).await?;
            }
            tx.commit().await
        })
    }
}

/// Runs a future to completion, from inside or outside the runtime.
fn block_on<F: Future>(
    runtime: &Handle,
    f: F,
) -> F::Output {
    if Handle::try_current().is_ok() {
        block_in_place(|| runtime.block_on(f))
    } else {
        runtime.block_on(f)
    }
}
