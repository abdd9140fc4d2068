//! Statement generation.
//!
//! Statements are built with `?` placeholders and rewritten for the
//! target [`Dialect`] at the end. `NULL`s are never bound, they are
//! written into the statement as literals.

use crate::{Column, ColumnKind, Condition, OrderBy, Record, Table, Value};

/// The SQL dialect spoken by a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// A statement ready to be executed, with its bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Dialect {
    /// The column type used in `CREATE TABLE`.
    fn column_type(&self, col: &Column) -> String {
        use ColumnKind as K;

        match (self, col.kind()) {
            (Dialect::Sqlite, K::AutoId) => "INTEGER PRIMARY KEY".into(),
            (Dialect::Sqlite, K::Int | K::Bool) => "INTEGER".into(),
            (Dialect::Sqlite, K::Float) => "REAL".into(),
            (Dialect::Sqlite, K::Str) => "TEXT".into(),
            (Dialect::Postgres, K::AutoId) => {
                "BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY".into()
            }
            (Dialect::Postgres, K::Int) => "BIGINT".into(),
            (Dialect::Postgres, K::Float) => "DOUBLE PRECISION".into(),
            (Dialect::Postgres, K::Bool) => "BOOLEAN".into(),
            (Dialect::Postgres, K::Str) => match col.get_max_length() {
                Some(n) => format!("VARCHAR({n})"),
                None => "TEXT".into(),
            },
        }
    }

    /// Rewrite `?` placeholders into the dialect's style.
    fn finish(&self, sql: String, params: Vec<Value>) -> Statement {
        let sql = match self {
            Dialect::Sqlite => sql,
            Dialect::Postgres => replace_question_marks(sql),
        };

        Statement { sql, params }
    }
}

/// Replace `?` with `$1`, `$2` and so on.
///
/// Statements only ever contain identifiers and placeholders,
/// so every `?` is a placeholder.
fn replace_question_marks(stmt: String) -> String {
    // Since we change '?' to e.g. '$1' we need to
    // reserve some more space to avoid reallocating the whole string.
    const RESERVED: usize = 9;
    let mut buf = String::with_capacity(stmt.len() + RESERVED);

    let mut last_index = 0;

    for (n, (i, _)) in stmt.match_indices('?').enumerate() {
        buf.push_str(&stmt[last_index..i]);
        buf.push('$');
        buf.push_str(&(n + 1).to_string());

        last_index = i + 1;
    }
    // Push the tail
    buf.push_str(&stmt[last_index..]);

    buf
}

/// Push `value` as a placeholder, or as a literal if it is `NULL`.
fn push_value(buffer: &mut String, params: &mut Vec<Value>, value: &Value) {
    if value.is_null() {
        buffer.push_str("NULL");
    } else {
        buffer.push('?');
        params.push(value.clone());
    }
}

fn push_where(buffer: &mut String, params: &mut Vec<Value>, cond: &Condition) {
    if cond.is_all() {
        return;
    }

    let (stmt, args) = cond.to_sql();
    buffer.push_str(" WHERE ");
    buffer.push_str(&stmt);
    params.extend(args);
}

fn column_names(table: &Table) -> String {
    table
        .columns()
        .iter()
        .map(Column::name)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table(table: &Table, dialect: Dialect) -> String {
    let cols = table
        .columns()
        .iter()
        .map(|col| {
            // The list of "args" for the column definition.
            // Includes at least the column name and datatype.
            let mut args = vec![col.name().to_string(), dialect.column_type(col)];

            if col.is_not_null() {
                args.push("NOT NULL".into());
            }
            if col.is_unique() {
                args.push("UNIQUE".into());
            }

            args.join(" ")
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({cols})", table.name())
}

pub fn drop_table(table: &Table, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS {}", table.name())
    } else {
        format!("DROP TABLE {}", table.name())
    }
}

/// Build an `INSERT` for `record`.
///
/// An `AutoIdCol` holding `Null` is left out so the database assigns
/// the id. On Postgres the id is returned with `RETURNING`.
pub fn insert(table: &Table, record: &Record, dialect: Dialect) -> Statement {
    let mut cols = Vec::new();
    let mut values = String::new();
    let mut params = Vec::new();

    for (col, value) in table.columns().iter().zip(record.values()) {
        if col.is_auto_id() && value.is_null() {
            continue;
        }
        if !cols.is_empty() {
            values.push_str(", ");
        }
        cols.push(col.name());
        push_value(&mut values, &mut params, value);
    }

    let mut sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table.name())
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({values})",
            table.name(),
            cols.join(", ")
        )
    };

    if let (Dialect::Postgres, Some(auto_id)) = (dialect, table.auto_id_col()) {
        sql.push_str(" RETURNING ");
        sql.push_str(auto_id.name());
    }

    dialect.finish(sql, params)
}

/// Build the statement moving a Postgres identity sequence past the
/// largest id in the table, needed after inserting an explicit id.
///
/// SQLite derives new ids from the largest rowid and needs nothing.
pub fn sync_auto_id(table: &Table, dialect: Dialect) -> Option<String> {
    let auto_id = table.auto_id_col()?;
    match dialect {
        Dialect::Sqlite => None,
        Dialect::Postgres => Some(format!(
            "SELECT setval(pg_get_serial_sequence('{t}', '{c}'), \
             (SELECT MAX({c}) FROM {t}))",
            t = table.name(),
            c = auto_id.name()
        )),
    }
}

pub fn select(
    table: &Table,
    cond: &Condition,
    order_by: &[OrderBy],
    limit: Option<usize>,
    dialect: Dialect,
) -> Statement {
    let mut sql = format!("SELECT {} FROM {}", column_names(table), table.name());
    let mut params = Vec::new();

    push_where(&mut sql, &mut params, cond);

    if !order_by.is_empty() {
        let order = order_by
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {n}"));
    }

    dialect.finish(sql, params)
}

/// Build an `UPDATE` setting every column except the `AutoIdCol`
/// to the record's values.
pub fn update(table: &Table, record: &Record, cond: &Condition, dialect: Dialect) -> Statement {
    let mut sql = format!("UPDATE {} SET ", table.name());
    let mut params = Vec::new();
    let mut first = true;

    for (col, value) in table.columns().iter().zip(record.values()) {
        if col.is_auto_id() {
            continue;
        }
        if !first {
            sql.push_str(", ");
        }
        first = false;

        sql.push_str(col.name());
        sql.push_str(" = ");
        push_value(&mut sql, &mut params, value);
    }

    push_where(&mut sql, &mut params, cond);

    dialect.finish(sql, params)
}

pub fn delete(table: &Table, cond: &Condition, dialect: Dialect) -> Statement {
    let mut sql = format!("DELETE FROM {}", table.name());
    let mut params = Vec::new();

    push_where(&mut sql, &mut params, cond);

    dialect.finish(sql, params)
}

#[cfg(test)]
mod tests {
    use super::Dialect;
    use crate::{record, Column, Condition, QueryCol, Table, Value};

    fn foo() -> Table {
        Table::new(
            "foo",
            [
                Column::auto_id("foo_id"),
                Column::int("i1").not_null(),
                Column::string("s1").max_length(10).unique(),
            ],
        )
    }

    #[test]
    fn create_table() {
        assert_eq!(
            super::create_table(&foo(), Dialect::Sqlite),
            "CREATE TABLE foo (foo_id INTEGER PRIMARY KEY, i1 INTEGER NOT NULL, s1 TEXT UNIQUE)"
        );
        assert_eq!(
            super::create_table(&foo(), Dialect::Postgres),
            "CREATE TABLE foo (foo_id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, \
             i1 BIGINT NOT NULL, s1 VARCHAR(10) UNIQUE)"
        );
    }

    #[test]
    fn drop_table() {
        assert_eq!(super::drop_table(&foo(), false), "DROP TABLE foo");
        assert_eq!(super::drop_table(&foo(), true), "DROP TABLE IF EXISTS foo");
    }

    #[test]
    fn insert_with_id() {
        let foo = foo();
        let rec = record!(foo, foo_id = 1, i1 = 101, s1 = "alpha").unwrap();

        let stmt = super::insert(&foo, &rec, Dialect::Sqlite);
        assert_eq!(
            stmt.sql,
            "INSERT INTO foo (foo_id, i1, s1) VALUES (?, ?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::Int(1), Value::Int(101), Value::from("alpha")]
        );
    }

    #[test]
    fn sync_auto_id() {
        let foo = foo();
        assert_eq!(super::sync_auto_id(&foo, Dialect::Sqlite), None);
        assert_eq!(
            super::sync_auto_id(&foo, Dialect::Postgres).unwrap(),
            "SELECT setval(pg_get_serial_sequence('foo', 'foo_id'), \
             (SELECT MAX(foo_id) FROM foo))"
        );

        let bar = Table::new("bar", [Column::int("bi")]);
        assert_eq!(super::sync_auto_id(&bar, Dialect::Postgres), None);
    }

    #[test]
    fn insert_auto_id() {
        let foo = foo();
        let rec = record!(foo, i1 = 101).unwrap();

        let stmt = super::insert(&foo, &rec, Dialect::Sqlite);
        assert_eq!(stmt.sql, "INSERT INTO foo (i1, s1) VALUES (?, NULL)");
        assert_eq!(stmt.params, vec![Value::Int(101)]);

        let stmt = super::insert(&foo, &rec, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "INSERT INTO foo (i1, s1) VALUES ($1, NULL) RETURNING foo_id"
        );
    }

    #[test]
    fn insert_default_values() {
        let t = Table::new("t", [Column::auto_id("id")]);
        let rec = record!(t).unwrap();

        let stmt = super::insert(&t, &rec, Dialect::Sqlite);
        assert_eq!(stmt.sql, "INSERT INTO t DEFAULT VALUES");
    }

    #[test]
    fn select() {
        let foo = foo();
        let i1 = QueryCol::new("i1");

        let stmt = super::select(&foo, &Condition::all(), &[], None, Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT foo_id, i1, s1 FROM foo");

        let stmt = super::select(
            &foo,
            &(i1.gt(1) & i1.lt(9)),
            &[i1.desc(), QueryCol::new("foo_id").asc()],
            Some(2),
            Dialect::Postgres,
        );
        assert_eq!(
            stmt.sql,
            "SELECT foo_id, i1, s1 FROM foo WHERE i1 > $1 AND i1 < $2 \
             ORDER BY i1 DESC, foo_id ASC LIMIT 2"
        );
        assert_eq!(stmt.params, vec![Value::Int(1), Value::Int(9)]);
    }

    #[test]
    fn update() {
        let foo = foo();
        let rec = record!(foo, foo_id = 2, i1 = 7).unwrap();
        let cond = QueryCol::new("foo_id").eq(2);

        let stmt = super::update(&foo, &rec, &cond, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "UPDATE foo SET i1 = $1, s1 = NULL WHERE foo_id = $2"
        );
        assert_eq!(stmt.params, vec![Value::Int(7), Value::Int(2)]);
    }

    #[test]
    fn delete() {
        let foo = foo();

        let stmt = super::delete(&foo, &Condition::all(), Dialect::Sqlite);
        assert_eq!(stmt.sql, "DELETE FROM foo");

        let stmt = super::delete(&foo, &QueryCol::new("i1").eq(4), Dialect::Sqlite);
        assert_eq!(stmt.sql, "DELETE FROM foo WHERE i1 = ?");
    }
}
