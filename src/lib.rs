//! `binder` is a small object-relational binding layer for SQLite and
//! PostgreSQL.
//!
//! Tables are declared at runtime as a list of typed columns. Records
//! for them are built in memory, type checked against the columns and
//! written through a [`Conn`], which takes care of generating the SQL.
//!
//! # Usage
//!
//! ```
//! use binder::{record, Column, Config, QueryCol, Table};
//! use once_cell::sync::Lazy;
//!
//! static FOO: Lazy<Table> = Lazy::new(|| {
//!     Table::new(
//!         "foo",
//!         [Column::auto_id("foo_id"), Column::int("i1"), Column::string("s1")],
//!     )
//! });
//!
//! #[tokio::main]
//! async fn main() -> Result<(), binder::Error> {
//!     let conn = binder::connect(&Config::new("sqlite::memory:")).await?;
//!     conn.create_table(&FOO).await?;
//!
//!     conn.insert(&FOO, &mut record!(FOO, foo_id = 1, i1 = 101, s1 = "alpha")?).await?;
//!     conn.insert(&FOO, &mut record!(FOO, foo_id = 2, i1 = 101, s1 = "beta")?).await?;
//!     conn.commit().await?;
//!
//!     // Get a row by its id...
//!     let foo1 = conn.get(&FOO, 1).await?.unwrap();
//!     assert_eq!(foo1.try_get::<String>("s1")?, "alpha");
//!
//!     // ...or select by any condition.
//!     let i1 = QueryCol::new("i1");
//!     let rows = conn.select(&FOO, i1.eq(101), &[QueryCol::new("s1").desc()]).await?;
//!     assert_eq!(rows.len(), 2);
//!
//!     // `get` and `select_one` refuse ambiguous matches.
//!     assert!(conn.select_one(&FOO, i1.eq(101)).await.is_err());
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Every operation returns a [`Result`] with the crate's [`Error`]:
//!
//!  * [`Error::Assertion`] - the call broke an operation's contract, e.g.
//!    `get(): table 'bar' does not have AutoIdCol`
//!  * [`Error::Type`] - a value doesn't fit its column, e.g.
//!    `AutoIdCol 'foo_id': int expected, got str`
//!  * [`Error::Db`] - the database refused, e.g. `no such table: foo`
//!
//! ## Models
//!
//! Structs deriving [`Model`] get a table declaration for free and can
//! be passed to [`Conn::insert_model`], [`Conn::get_model`] and
//! [`Conn::select_models`].

// This allows importing this crate's contents from binder-derive.
extern crate self as binder;

pub mod backend;
mod condition;
mod config;
mod conn;
mod error;
mod model;
#[cfg(feature = "postgres")]
mod pool;
mod record;
mod schema;
pub mod sql;
mod value;

pub use binder_derive::Model;
pub use condition::{CmpOp, Condition, OrderBy, QueryCol};
pub use config::{connect, Config};
pub use conn::Conn;
pub use error::{AssertionError, AssertionInfo, DbError, Error, TypeError};
pub use model::Model;
#[cfg(feature = "postgres")]
pub use pool::PgPool;
pub use record::Record;
pub use schema::{Column, ColumnKind, Table};
pub use value::{FromValue, Value};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

pub mod prelude {
    pub use crate::{
        connect, record, Column, Condition, Config, Conn, Error, Model, QueryCol, Record, Table,
        Value,
    };
}
