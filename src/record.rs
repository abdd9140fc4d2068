use crate::{AssertionError, Error, FromValue, Table, TypeError, Value};

/// A row of a [`Table`], held in memory.
///
/// Fields are kept in the table's column order, so two records
/// for the same table compare equal exactly when all their values do.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create a record for `table` with every field set to `Null`.
    pub fn new(table: &Table) -> Record {
        Record {
            fields: table
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), Value::Null))
                .collect(),
        }
    }

    /// Create a record from values given in the table's column order.
    ///
    /// # Panics
    /// Panics if the number of values differs from the number of columns.
    pub fn from_values(table: &Table, values: Vec<Value>) -> Record {
        assert_eq!(
            table.columns().len(),
            values.len(),
            "table '{}' has {} columns",
            table.name(),
            table.columns().len()
        );

        Record {
            fields: table
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .zip(values)
                .collect(),
        }
    }

    /// Get the value of column `col`.
    pub fn get(&self, col: &str) -> Option<&Value> {
        self.fields.iter().find(|(c, _)| c == col).map(|(_, v)| v)
    }

    /// Get the value of column `col`, converted to `T`.
    ///
    /// # Example
    ///
    /// ```
    /// use binder::{record, Column, Table};
    ///
    /// let foo = Table::new("foo", [Column::auto_id("foo_id"), Column::string("s1")]);
    /// let rec = record!(foo, foo_id = 1, s1 = "alpha").unwrap();
    ///
    /// assert_eq!(rec.try_get::<i64>("foo_id").unwrap(), 1);
    /// assert_eq!(
    ///     rec.try_get::<i64>("s1").unwrap_err().to_string(),
    ///     "column 's1': int expected, got str"
    /// );
    /// ```
    pub fn try_get<T: FromValue>(&self, col: &str) -> Result<T, Error> {
        let value = self.get(col).ok_or_else(|| no_such_column(col))?;

        T::from_value(value).ok_or_else(|| {
            TypeError::new(format!(
                "column '{col}': {} expected, got {}",
                T::EXPECTED,
                value.type_name()
            ))
            .into()
        })
    }

    /// Set the value of column `col`.
    pub fn set(&mut self, col: &str, value: impl Into<Value>) -> Result<(), Error> {
        let field = self
            .fields
            .iter_mut()
            .find(|(c, _)| c == col)
            .ok_or_else(|| no_such_column(col))?;
        field.1 = value.into();

        Ok(())
    }

    /// The record's column names, in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    /// The record's values, in column order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    /// Whether this record has exactly the columns of `table`.
    pub(crate) fn matches(&self, table: &Table) -> bool {
        self.fields.len() == table.columns().len()
            && self
                .columns()
                .zip(table.columns())
                .all(|(a, b)| a == b.name())
    }

    pub(crate) fn value_at(&self, i: usize) -> &Value {
        &self.fields[i].1
    }

    pub(crate) fn set_at(&mut self, i: usize, value: Value) {
        self.fields[i].1 = value;
    }
}

fn no_such_column(col: &str) -> Error {
    AssertionError::new(format!("record has no column '{col}'")).into()
}

/// Build a [`Record`] for a table from `column = value` pairs.
///
/// Expands to [`Table::new_record`], so it returns a `Result`.
///
/// # Example
///
/// ```
/// use binder::{record, Column, Table, Value};
///
/// let foo = Table::new(
///     "foo",
///     [Column::auto_id("foo_id"), Column::int("i1"), Column::string("s1")],
/// );
/// let foo1 = record!(foo, foo_id = 1, i1 = 101, s1 = "alpha").unwrap();
///
/// assert_eq!(foo1.get("s1"), Some(&Value::from("alpha")));
/// ```
#[macro_export]
macro_rules! record {
    ($table:expr $(, $col:ident = $val:expr)* $(,)?) => {
        $table.new_record([
            $((stringify!($col), $crate::Value::from($val))),*
        ])
    };
}
