use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio_postgres::{
    types::{ToSql, Type},
    Row,
};

use tracing::warn;

use super::Backend;
use crate::{pool::Client, sql::Dialect, DbError, Value};

/// A [`Backend`] for PostgreSQL, running on a client checked
/// out of a [`PgPool`](crate::PgPool).
///
/// Inside a transaction every statement runs under a savepoint. A failing
/// statement is rolled back on its own, so the transaction stays usable
/// the way it does on SQLite instead of being aborted as a whole.
pub struct PgBackend {
    client: Client,
    in_transaction: AtomicBool,
}

type Params = Vec<Box<dyn ToSql + Sync + Send>>;

impl PgBackend {
    pub(crate) fn new(client: Client) -> PgBackend {
        PgBackend {
            client,
            in_transaction: AtomicBool::new(false),
        }
    }

    async fn begin(&self) -> Result<(), DbError> {
        if !self.in_transaction.load(Ordering::Acquire) {
            self.client.batch_execute("BEGIN").await?;
            self.in_transaction.store(true, Ordering::Release);
        }

        Ok(())
    }

    /// Await `stmt`, rolling back only its own effects if it fails
    /// inside the open transaction.
    async fn guarded<T>(
        &self,
        stmt: impl Future<Output = Result<T, tokio_postgres::Error>>,
    ) -> Result<T, DbError> {
        if !self.in_transaction.load(Ordering::Acquire) {
            return Ok(stmt.await?);
        }

        self.client.batch_execute("SAVEPOINT binder_stmt").await?;
        match stmt.await {
            Ok(out) => {
                self.client
                    .batch_execute("RELEASE SAVEPOINT binder_stmt")
                    .await?;
                Ok(out)
            }
            Err(err) => {
                let reset = "ROLLBACK TO SAVEPOINT binder_stmt; RELEASE SAVEPOINT binder_stmt";
                if let Err(reset_err) = self.client.batch_execute(reset).await {
                    warn!(%reset_err, "couldn't roll back failed statement");
                }
                Err(err.into())
            }
        }
    }

    /// End the open transaction, if there is one.
    async fn finish(&self, stmt: &str) -> Result<(), DbError> {
        if self.in_transaction.swap(false, Ordering::AcqRel) {
            self.client.batch_execute(stmt).await?;
        }

        Ok(())
    }
}

fn to_params(params: &[Value]) -> Params {
    params
        .iter()
        .map(|v| -> Box<dyn ToSql + Sync + Send> {
            match v {
                Value::Null => Box::new(None::<String>),
                Value::Int(i) => Box::new(*i),
                Value::Float(x) => Box::new(*x),
                Value::Bool(b) => Box::new(*b),
                Value::Str(s) => Box::new(s.clone()),
            }
        })
        .collect()
}

fn as_refs(params: &Params) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|i| &**i as _).collect()
}

fn from_row(row: &Row) -> Result<Vec<Value>, DbError> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let ty = col.type_();
            let value = if *ty == Type::INT8 {
                row.try_get::<_, Option<i64>>(i)?.into()
            } else if *ty == Type::INT4 {
                row.try_get::<_, Option<i32>>(i)?.into()
            } else if *ty == Type::INT2 {
                row.try_get::<_, Option<i16>>(i)?.into()
            } else if *ty == Type::FLOAT8 {
                row.try_get::<_, Option<f64>>(i)?.into()
            } else if *ty == Type::FLOAT4 {
                row.try_get::<_, Option<f32>>(i)?.into()
            } else if *ty == Type::BOOL {
                row.try_get::<_, Option<bool>>(i)?.into()
            } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(ty) {
                row.try_get::<_, Option<String>>(i)?.into()
            } else {
                return Err(DbError::new(format!(
                    "column '{}': unsupported type {ty}",
                    col.name()
                )));
            };

            Ok(value)
        })
        .collect()
}

#[async_trait]
impl Backend for PgBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, stmt: &str, params: &[Value]) -> Result<u64, DbError> {
        self.begin().await?;
        let params = to_params(params);
        let refs = as_refs(&params);

        self.guarded(self.client.execute(stmt, &refs)).await
    }

    async fn query(&self, stmt: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, DbError> {
        let params = to_params(params);
        let refs = as_refs(&params);
        let rows = self.guarded(self.client.query(stmt, &refs)).await?;

        rows.iter().map(from_row).collect()
    }

    async fn insert_returning_id(&self, stmt: &str, params: &[Value]) -> Result<i64, DbError> {
        self.begin().await?;
        let params = to_params(params);
        let refs = as_refs(&params);
        let row = self.guarded(self.client.query_one(stmt, &refs)).await?;

        Ok(row.try_get(0)?)
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.finish("ROLLBACK").await
    }
}
