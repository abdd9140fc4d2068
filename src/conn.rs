use tracing::debug;

use crate::{
    backend::Backend,
    sql::{self, Statement},
    AssertionError, ColumnKind, Condition, Error, Model, OrderBy, QueryCol, Record, Table, Value,
};

/// A connection to a database, offering the binder's operations
/// on declared [`Table`]s.
///
/// Writes are only made durable by [`Conn::commit`]; dropping a `Conn`
/// discards everything written since the last commit. A statement which
/// fails leaves the writes before it in place, on every backend.
///
/// # Example
///
/// ```
/// use binder::{record, Column, Config, Table};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), binder::Error> {
/// let foo = Table::new(
///     "foo",
///     [Column::auto_id("foo_id"), Column::int("i1"), Column::string("s1")],
/// );
///
/// let conn = binder::connect(&Config::new("sqlite::memory:")).await?;
/// conn.create_table(&foo).await?;
///
/// let mut foo1 = record!(foo, i1 = 101, s1 = "alpha")?;
/// conn.insert(&foo, &mut foo1).await?;
/// conn.commit().await?;
///
/// assert_eq!(foo1.get("foo_id"), Some(&binder::Value::Int(1)));
/// assert_eq!(conn.get(&foo, 1).await?, Some(foo1));
/// assert_eq!(conn.get(&foo, 2).await?, None);
/// # Ok(())
/// # }
/// ```
pub struct Conn {
    backend: Box<dyn Backend>,
    read_only: bool,
}

impl Conn {
    /// Wrap a backend.
    pub fn new(backend: Box<dyn Backend>, read_only: bool) -> Conn {
        Conn { backend, read_only }
    }

    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn check_writable(&self, op: &str) -> Result<(), Error> {
        if self.read_only {
            return Err(AssertionError::new(format!("{op}(): Conn is read only")).into());
        }

        Ok(())
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64, Error> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "execute");
        Ok(self.backend.execute(&stmt.sql, &stmt.params).await?)
    }

    async fn query(&self, stmt: &Statement) -> Result<Vec<Vec<Value>>, Error> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "query");
        Ok(self.backend.query(&stmt.sql, &stmt.params).await?)
    }

    fn ddl(sql: String) -> Statement {
        Statement {
            sql,
            params: Vec::new(),
        }
    }

    /// Create the table in the database.
    pub async fn create_table(&self, table: &Table) -> Result<(), Error> {
        self.check_writable("create_table")?;
        let stmt = Self::ddl(sql::create_table(table, self.backend.dialect()));
        self.execute(&stmt).await.map(|_| ())
    }

    /// Drop the table. Fails with a [`DbError`](crate::DbError) if it
    /// doesn't exist.
    pub async fn drop_table(&self, table: &Table) -> Result<(), Error> {
        self.check_writable("drop_table")?;
        self.execute(&Self::ddl(sql::drop_table(table, false)))
            .await
            .map(|_| ())
    }

    /// Drop the table if it exists.
    pub async fn drop_table_if_exists(&self, table: &Table) -> Result<(), Error> {
        self.check_writable("drop_table_if_exists")?;
        self.execute(&Self::ddl(sql::drop_table(table, true)))
            .await
            .map(|_| ())
    }

    /// Insert a record.
    ///
    /// Every value is checked against its column first. If the table's
    /// `AutoIdCol` is `Null`, the database assigns an id which is then
    /// written back into `record`. Explicit ids and assigned ones can be
    /// mixed: ids assigned later are always larger than any in the table.
    pub async fn insert(&self, table: &Table, record: &mut Record) -> Result<(), Error> {
        self.check_writable("insert")?;
        check_record("insert", table, record)?;

        let stmt = sql::insert(table, record, self.backend.dialect());

        match table.auto_id_position() {
            Some(i) if record.value_at(i).is_null() => {
                debug!(sql = %stmt.sql, params = ?stmt.params, "insert");
                let id = self
                    .backend
                    .insert_returning_id(&stmt.sql, &stmt.params)
                    .await?;
                record.set_at(i, Value::Int(id));
            }
            _ => {
                self.execute(&stmt).await?;
                if let Some(sync) = sql::sync_auto_id(table, self.backend.dialect()) {
                    self.query(&Self::ddl(sync)).await?;
                }
            }
        }

        Ok(())
    }

    /// Insert a [`Model`], filling in its auto-generated id.
    pub async fn insert_model<M: Model>(&self, model: &mut M) -> Result<(), Error> {
        let mut record = model.to_record();
        self.insert(M::table(), &mut record).await?;
        *model = M::from_record(&record)?;

        Ok(())
    }

    /// Get the row whose `AutoIdCol` equals `id`.
    ///
    /// Returns `Ok(None)` if there is no such row.
    ///
    /// Fails
    ///  - if the table has no `AutoIdCol`
    ///  - if `id` is `Null`
    ///  - with a [`TypeError`](crate::TypeError) if `id` has the wrong type
    ///  - if more than one row matches, see [`Conn::select_one`]
    pub async fn get(&self, table: &Table, id: impl Into<Value>) -> Result<Option<Record>, Error> {
        let cond = id_condition("get", table, id.into())?;
        self.select_one(table, cond).await
    }

    /// Get a [`Model`] by its auto-generated id.
    pub async fn get_model<M: Model>(&self, id: impl Into<Value>) -> Result<Option<M>, Error> {
        self.get(M::table(), id)
            .await?
            .map(|r| M::from_record(&r))
            .transpose()
    }

    /// Select all rows matching `cond`, ordered by `order_by`.
    pub async fn select(
        &self,
        table: &Table,
        cond: Condition,
        order_by: &[OrderBy],
    ) -> Result<Vec<Record>, Error> {
        check_condition("select", table, &cond, order_by)?;
        let stmt = sql::select(table, &cond, order_by, None, self.backend.dialect());

        self.query(&stmt)
            .await?
            .into_iter()
            .map(|row| to_record(table, row))
            .collect()
    }

    /// Select all [`Model`]s matching `cond`.
    pub async fn select_models<M: Model>(
        &self,
        cond: Condition,
        order_by: &[OrderBy],
    ) -> Result<Vec<M>, Error> {
        self.select(M::table(), cond, order_by)
            .await?
            .iter()
            .map(M::from_record)
            .collect()
    }

    /// Select the single row matching `cond`.
    ///
    /// Returns `Ok(None)` if no row matches. If more than one does,
    /// this fails with the assertion `select_one(): more than 1 row`,
    /// carrying the table name and the rendered condition.
    pub async fn select_one(
        &self,
        table: &Table,
        cond: Condition,
    ) -> Result<Option<Record>, Error> {
        check_condition("select_one", table, &cond, &[])?;
        // Two rows are enough to tell whether the match is ambiguous.
        let stmt = sql::select(table, &cond, &[], Some(2), self.backend.dialect());

        let mut rows = self.query(&stmt).await?;
        if rows.len() > 1 {
            return Err(AssertionError::with_info(
                "select_one(): more than 1 row",
                table.name(),
                cond.to_string(),
            )
            .into());
        }

        rows.pop().map(|row| to_record(table, row)).transpose()
    }

    /// Update every row matching `cond` with the values of `record`.
    /// The `AutoIdCol` is left untouched.
    ///
    /// Returns the number of rows updated.
    pub async fn update(
        &self,
        table: &Table,
        record: &Record,
        cond: Condition,
    ) -> Result<u64, Error> {
        self.check_writable("update")?;
        check_record("update", table, record)?;
        check_condition("update", table, &cond, &[])?;
        if table.columns().iter().all(|c| c.is_auto_id()) {
            return Err(AssertionError::new(format!(
                "update(): table '{}' has no columns to update",
                table.name()
            ))
            .into());
        }

        let stmt = sql::update(table, record, &cond, self.backend.dialect());
        self.execute(&stmt).await
    }

    /// Update the row with the same `AutoIdCol` value as `record`.
    ///
    /// Fails with the assertion `update_by_id(): no row matched`
    /// if there is no such row.
    pub async fn update_by_id(&self, table: &Table, record: &Record) -> Result<(), Error> {
        self.check_writable("update_by_id")?;
        check_record("update_by_id", table, record)?;

        let id = table
            .auto_id_position()
            .map(|i| record.value_at(i).clone())
            .unwrap_or(Value::Null);
        let cond = id_condition("update_by_id", table, id)?;
        let rendered = cond.to_string();

        if self.update(table, record, cond).await? == 0 {
            return Err(AssertionError::with_info(
                "update_by_id(): no row matched",
                table.name(),
                rendered,
            )
            .into());
        }

        Ok(())
    }

    /// Delete every row matching `cond`, returning how many were deleted.
    pub async fn delete(&self, table: &Table, cond: Condition) -> Result<u64, Error> {
        self.check_writable("delete")?;
        check_condition("delete", table, &cond, &[])?;

        let stmt = sql::delete(table, &cond, self.backend.dialect());
        self.execute(&stmt).await
    }

    /// Delete the row whose `AutoIdCol` equals `id`.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_by_id(&self, table: &Table, id: impl Into<Value>) -> Result<bool, Error> {
        self.check_writable("delete_by_id")?;
        let cond = id_condition("delete_by_id", table, id.into())?;

        Ok(self.delete(table, cond).await? > 0)
    }

    /// Make everything written since the last commit durable.
    pub async fn commit(&self) -> Result<(), Error> {
        debug!("commit");
        Ok(self.backend.commit().await?)
    }

    /// Discard everything written since the last commit.
    pub async fn rollback(&self) -> Result<(), Error> {
        debug!("rollback");
        Ok(self.backend.rollback().await?)
    }
}

/// Build the condition `<AutoIdCol> = id`, checking the preconditions
/// shared by the by-id operations.
fn id_condition(op: &str, table: &Table, id: Value) -> Result<Condition, Error> {
    let col = table.auto_id_col().ok_or_else(|| {
        AssertionError::new(format!(
            "{op}(): table '{}' does not have AutoIdCol",
            table.name()
        ))
    })?;

    if id.is_null() {
        return Err(AssertionError::new(format!("{op}(): cannot use None for AutoIdCol")).into());
    }

    col.check_type(&id)?;

    Ok(QueryCol::new(col.name()).eq(id))
}

fn check_record(op: &str, table: &Table, record: &Record) -> Result<(), Error> {
    if !record.matches(table) {
        return Err(AssertionError::new(format!(
            "{op}(): record does not match table '{}'",
            table.name()
        ))
        .into());
    }

    for (col, value) in table.columns().iter().zip(record.values()) {
        col.validate(value)?;
    }

    Ok(())
}

/// Check that the condition and ordering only mention columns of the
/// table, and compare them to values of the right type.
fn check_condition(
    op: &str,
    table: &Table,
    cond: &Condition,
    order_by: &[OrderBy],
) -> Result<(), Error> {
    let mut result: Result<(), Error> = Ok(());

    cond.visit(&mut |name, value| {
        if result.is_err() {
            return;
        }
        result = match table.column(name) {
            Some(col) => col.check_type(value).map_err(Error::from),
            None => Err(no_such_column(op, table, name)),
        };
    });
    result?;

    match order_by.iter().find(|o| table.column(o.col()).is_none()) {
        Some(o) => Err(no_such_column(op, table, o.col())),
        None => Ok(()),
    }
}

fn no_such_column(op: &str, table: &Table, name: &str) -> Error {
    AssertionError::new(format!(
        "{op}(): table '{}' has no column '{name}'",
        table.name()
    ))
    .into()
}

/// Turn a row read from the database back into a record, restoring
/// the column types the backend may have lost (booleans on SQLite).
fn to_record(table: &Table, row: Vec<Value>) -> Result<Record, Error> {
    let values = table
        .columns()
        .iter()
        .zip(row)
        .map(|(col, value)| {
            let value = match (col.kind(), value) {
                (ColumnKind::Bool, Value::Int(i)) => Value::Bool(i != 0),
                (_, value) => value,
            };
            col.check_type(&value)?;

            Ok(value)
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(Record::from_values(table, values))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::Conn;
    use crate::{backend::Backend, record, sql::Dialect, Column, DbError, Table, Value};

    /// Remembers every statement, answering queries with no rows.
    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn push(&self, stmt: &str) {
            self.log.lock().unwrap().push(stmt.to_string());
        }
    }

    #[async_trait]
    impl Backend for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn execute(&self, stmt: &str, _: &[Value]) -> Result<u64, DbError> {
            self.push(stmt);
            Ok(1)
        }

        async fn query(&self, stmt: &str, _: &[Value]) -> Result<Vec<Vec<Value>>, DbError> {
            self.push(stmt);
            Ok(Vec::new())
        }

        async fn insert_returning_id(&self, stmt: &str, _: &[Value]) -> Result<i64, DbError> {
            self.push(stmt);
            Ok(3)
        }

        async fn commit(&self) -> Result<(), DbError> {
            Ok(())
        }

        async fn rollback(&self) -> Result<(), DbError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn explicit_ids_advance_the_identity() {
        let foo = Table::new("foo", [Column::auto_id("foo_id"), Column::int("i1")]);
        let recorder = Recorder::default();
        let conn = Conn::new(Box::new(recorder.clone()), false);

        conn.insert(&foo, &mut record!(foo, foo_id = 2, i1 = 1).unwrap())
            .await
            .unwrap();
        let mut rec = record!(foo, i1 = 2).unwrap();
        conn.insert(&foo, &mut rec).await.unwrap();
        assert_eq!(rec.get("foo_id"), Some(&Value::Int(3)));

        assert_eq!(
            recorder.log(),
            [
                "INSERT INTO foo (foo_id, i1) VALUES ($1, $2) RETURNING foo_id",
                "SELECT setval(pg_get_serial_sequence('foo', 'foo_id'), \
                 (SELECT MAX(foo_id) FROM foo))",
                "INSERT INTO foo (i1) VALUES ($1) RETURNING foo_id",
            ]
        );
    }

    #[tokio::test]
    async fn tables_without_auto_id_need_no_sync() {
        let bar = Table::new("bar", [Column::int("bi")]);
        let recorder = Recorder::default();
        let conn = Conn::new(Box::new(recorder.clone()), false);

        conn.insert(&bar, &mut record!(bar, bi = 1).unwrap())
            .await
            .unwrap();
        assert_eq!(recorder.log(), ["INSERT INTO bar (bi) VALUES ($1)"]);
    }
}
