use std::{path::Path, sync::Mutex, time::Duration};

use async_trait::async_trait;
use rusqlite::{params_from_iter, types::ValueRef, Connection, OpenFlags};
use tracing::info;

use super::Backend;
use crate::{sql::Dialect, DbError, Value};

/// How long to wait for another connection's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Backend`] for SQLite databases, built on `rusqlite`.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) the database file at `path`.
    ///
    /// Read-only connections require the file to exist.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<SqliteBackend, DbError> {
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };

        let conn = Connection::open_with_flags(path.as_ref(), flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        info!(path = %path.as_ref().display(), read_only, "opened sqlite database");

        Ok(SqliteBackend {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<SqliteBackend, DbError> {
        let conn = Connection::open_in_memory()?;
        info!("opened in-memory sqlite database");

        Ok(SqliteBackend {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DbError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::new("sqlite connection lock poisoned"))?;

        f(&conn).map_err(DbError::from)
    }

    /// Like `with_conn`, but makes sure a transaction is open first.
    fn with_transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DbError> {
        self.with_conn(|conn| {
            if conn.is_autocommit() {
                conn.execute_batch("BEGIN")?;
            }
            f(conn)
        })
    }

    /// End the open transaction, if there is one.
    fn finish(&self, stmt: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            if !conn.is_autocommit() {
                conn.execute_batch(stmt)?;
            }
            Ok(())
        })
    }
}

fn to_value(value: ValueRef<'_>) -> rusqlite::Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) => Value::Str(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(rusqlite::Error::InvalidColumnType(
                0,
                "blob".to_string(),
                rusqlite::types::Type::Blob,
            ))
        }
    })
}

#[async_trait]
impl Backend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, stmt: &str, params: &[Value]) -> Result<u64, DbError> {
        self.with_transaction(|conn| conn.execute(stmt, params_from_iter(params.iter())))
            .map(|n| n as u64)
    }

    async fn query(&self, stmt: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(stmt)?;
            let n_cols = stmt.column_count();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;

            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                let values = (0..n_cols)
                    .map(|i| row.get_ref(i).and_then(to_value))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                result.push(values);
            }

            Ok(result)
        })
    }

    async fn insert_returning_id(&self, stmt: &str, params: &[Value]) -> Result<i64, DbError> {
        self.with_transaction(|conn| {
            conn.execute(stmt, params_from_iter(params.iter()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn commit(&self) -> Result<(), DbError> {
        self.finish("COMMIT")
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.finish("ROLLBACK")
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteBackend;
    use crate::{backend::Backend, Value};

    #[tokio::test]
    async fn uncommitted_writes_are_visible_to_the_same_connection() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (a INTEGER, b TEXT)", &[])
            .await
            .unwrap();
        db.execute(
            "INSERT INTO t (a, b) VALUES (?, ?)",
            &[1.into(), "x".into()],
        )
        .await
        .unwrap();

        let rows = db.query("SELECT a, b FROM t", &[]).await.unwrap();
        assert_eq!(rows, vec![vec![Value::Int(1), Value::from("x")]]);

        db.rollback().await.unwrap();
        let err = db.query("SELECT a, b FROM t", &[]).await.unwrap_err();
        assert_eq!(err.to_string(), "no such table: t");
    }

    #[tokio::test]
    async fn insert_returns_rowid() {
        let db = SqliteBackend::open_in_memory().unwrap();
        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, a REAL)", &[])
            .await
            .unwrap();

        let id = db
            .insert_returning_id("INSERT INTO t (a) VALUES (?)", &[0.5.into()])
            .await
            .unwrap();
        assert_eq!(id, 1);

        let id = db
            .insert_returning_id("INSERT INTO t (id, a) VALUES (?, NULL)", &[7.into()])
            .await
            .unwrap();
        assert_eq!(id, 7);

        db.commit().await.unwrap();
        // Nothing to commit.
        db.commit().await.unwrap();
    }
}
