//! The boundary between [`Conn`](crate::Conn) and the database driver.

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "postgres")]
pub use postgres::PgBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use async_trait::async_trait;

use crate::{sql::Dialect, DbError, Value};

/// A single connection to a database.
///
/// Statements use the placeholder style of the backend's [`Dialect`]
/// and never bind `NULL`s.
///
/// Writes happen inside a transaction which the backend opens on
/// the first write after a `commit` or `rollback`. Dropping a backend
/// with an open transaction discards its writes.
#[async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Execute a statement and return the number of rows affected.
    async fn execute(&self, stmt: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Run a query and return all rows.
    async fn query(&self, stmt: &str, params: &[Value]) -> Result<Vec<Vec<Value>>, DbError>;

    /// Execute an `INSERT` and return the id the database assigned
    /// to the table's `AutoIdCol`.
    async fn insert_returning_id(&self, stmt: &str, params: &[Value]) -> Result<i64, DbError>;

    async fn commit(&self) -> Result<(), DbError>;

    async fn rollback(&self) -> Result<(), DbError>;
}
