use std::fmt;

use hashbrown::HashMap;

use crate::{AssertionError, Error, Record, TypeError, Value};

/// The kind of a [`Column`], deciding which values it accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// The auto-generated identity of a table. Holds ints,
    /// or `Null` until the database assigns one.
    AutoId,
    Int,
    Float,
    Bool,
    Str,
}

/// A column of a [`Table`].
///
/// # Example
///
/// ```
/// use binder::Column;
///
/// let name = Column::string("name").not_null().max_length(20);
/// assert_eq!(name.name(), "name");
/// assert!(name.is_not_null());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    not_null: bool,
    unique: bool,
    max_length: Option<usize>,
}

/// A table declaration.
///
/// Tables are declared once and passed by reference to every
/// [`Conn`](crate::Conn) operation. A `static` behind
/// `once_cell::sync::Lazy` works well:
///
/// ```
/// use binder::{Column, Table};
/// use once_cell::sync::Lazy;
///
/// static FOO: Lazy<Table> = Lazy::new(|| {
///     Table::new(
///         "foo",
///         [Column::auto_id("foo_id"), Column::int("i1"), Column::string("s1")],
///     )
/// });
///
/// assert_eq!(FOO.auto_id_col().unwrap().name(), "foo_id");
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    auto_id: Option<usize>,
}

impl ColumnKind {
    /// The name of the column kind used in error messages.
    pub const fn col_name(&self) -> &'static str {
        match self {
            ColumnKind::AutoId => "AutoIdCol",
            ColumnKind::Int => "IntCol",
            ColumnKind::Float => "FloatCol",
            ColumnKind::Bool => "BoolCol",
            ColumnKind::Str => "StringCol",
        }
    }

    /// The value type this kind of column holds.
    pub const fn expected(&self) -> &'static str {
        match self {
            ColumnKind::AutoId | ColumnKind::Int => "int",
            ColumnKind::Float => "float",
            ColumnKind::Bool => "bool",
            ColumnKind::Str => "str",
        }
    }

    const fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ColumnKind::AutoId | ColumnKind::Int, Value::Int(_))
                | (ColumnKind::Float, Value::Float(_))
                | (ColumnKind::Bool, Value::Bool(_))
                | (ColumnKind::Str, Value::Str(_))
        )
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.col_name())
    }
}

macro_rules! impl_col_constructors {
    ($($fn:ident => $kind:ident),+) => {
        $(
            pub fn $fn(name: impl Into<String>) -> Column {
                Column::new(name, ColumnKind::$kind)
            }
        )*
    };
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Column {
        Column {
            name: name.into(),
            kind,
            not_null: false,
            unique: false,
            max_length: None,
        }
    }

    impl_col_constructors!(
        auto_id => AutoId,
        int => Int,
        float => Float,
        bool => Bool,
        string => Str
    );

    /// Reject `Null` values. Has no effect on an `AutoIdCol`,
    /// which is always allowed to be `Null` before insertion.
    pub fn not_null(mut self) -> Column {
        self.not_null = self.kind != ColumnKind::AutoId;
        self
    }

    /// Add a `UNIQUE` constraint.
    pub fn unique(mut self) -> Column {
        self.unique = true;
        self
    }

    /// Limit the length (in characters) of a `StringCol`.
    ///
    /// # Panics
    /// Panics if the column is not a `StringCol`.
    pub fn max_length(mut self, n: usize) -> Column {
        assert!(
            self.kind == ColumnKind::Str,
            "max_length() only applies to StringCol, '{}' is {}",
            self.name,
            self.kind
        );
        self.max_length = Some(n);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub const fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    pub const fn get_max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub const fn is_auto_id(&self) -> bool {
        matches!(self.kind, ColumnKind::AutoId)
    }

    /// Check that `value` has the column's type. `Null` always passes.
    pub fn check_type(&self, value: &Value) -> Result<(), TypeError> {
        if self.kind.accepts(value) {
            return Ok(());
        }

        Err(TypeError::new(format!(
            "{} '{}': {} expected, got {}",
            self.kind,
            self.name,
            self.kind.expected(),
            value.type_name()
        )))
    }

    /// Check that `value` may be stored in this column: its type,
    /// nullability, length, and that floats are finite.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        self.check_type(value)?;

        if self.not_null && value.is_null() {
            return Err(TypeError::new(format!(
                "{} '{}': None not allowed",
                self.kind, self.name
            )));
        }

        if let Value::Float(x) = value {
            if !x.is_finite() {
                return Err(TypeError::new(format!(
                    "{} '{}': finite float expected, got {x:?}",
                    self.kind, self.name
                )));
            }
        }

        if let (Some(max), Value::Str(s)) = (self.max_length, value) {
            let len = s.chars().count();
            if len > max {
                return Err(TypeError::new(format!(
                    "{} '{}': string too long (max {max}, got {len})",
                    self.kind, self.name
                )));
            }
        }

        Ok(())
    }
}

/// Whether `name` can be used unquoted as a table or column name.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Table {
    /// Declare a new table.
    ///
    /// # Panics
    /// Panics if
    ///  - the table or a column name is not a plain SQL identifier
    ///  - `columns` is empty or contains a name twice
    ///  - there is more than one `AutoIdCol`
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = Column>) -> Table {
        let name = name.into();
        assert!(is_identifier(&name), "invalid table name '{name}'");

        let columns: Vec<Column> = columns.into_iter().collect();
        assert!(!columns.is_empty(), "table '{name}' has no columns");

        let mut index = HashMap::with_capacity(columns.len());
        let mut auto_id = None;

        for (i, col) in columns.iter().enumerate() {
            assert!(
                is_identifier(col.name()),
                "table '{name}': invalid column name '{}'",
                col.name()
            );
            let dup = index.insert(col.name().to_string(), i);
            assert!(
                dup.is_none(),
                "table '{name}': duplicate column '{}'",
                col.name()
            );

            if col.is_auto_id() {
                assert!(auto_id.is_none(), "table '{name}': more than one AutoIdCol");
                auto_id = Some(i);
            }
        }

        Table {
            name,
            columns,
            index,
            auto_id,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Get the column named `name`.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Get the position of the column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Get the table's `AutoIdCol`, if it has one.
    pub fn auto_id_col(&self) -> Option<&Column> {
        self.auto_id.map(|i| &self.columns[i])
    }

    pub(crate) fn auto_id_position(&self) -> Option<usize> {
        self.auto_id
    }

    /// Build a record for this table from `(column, value)` pairs.
    /// Columns which are not mentioned are `Null`.
    ///
    /// Values are not type checked here, that happens once the
    /// record is written.
    ///
    /// See also the [`record!`](crate::record) macro.
    pub fn new_record<'a, I>(&self, fields: I) -> Result<Record, Error>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut record = Record::new(self);
        for (col, value) in fields {
            if self.position(col).is_none() {
                return Err(AssertionError::new(format!(
                    "new(): table '{}' has no column '{col}'",
                    self.name
                ))
                .into());
            }
            record.set(col, value)?;
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, ColumnKind, Table};
    use crate::{Error, Value};

    fn foo() -> Table {
        Table::new(
            "foo",
            [
                Column::auto_id("foo_id"),
                Column::int("i1"),
                Column::string("s1").not_null().max_length(5),
            ],
        )
    }

    #[test]
    fn type_errors() {
        let foo = foo();
        let err = foo
            .auto_id_col()
            .unwrap()
            .check_type(&Value::from("4"))
            .unwrap_err();
        assert_eq!(err.to_string(), "AutoIdCol 'foo_id': int expected, got str");

        let err = foo
            .column("i1")
            .unwrap()
            .check_type(&2.5.into())
            .unwrap_err();
        assert_eq!(err.to_string(), "IntCol 'i1': int expected, got float");

        let err = foo
            .column("s1")
            .unwrap()
            .check_type(&7.into())
            .unwrap_err();
        assert_eq!(err.to_string(), "StringCol 's1': str expected, got int");
    }

    #[test]
    fn null_and_length() {
        let foo = foo();
        let s1 = foo.column("s1").unwrap();

        assert_eq!(
            s1.validate(&Value::Null).unwrap_err().to_string(),
            "StringCol 's1': None not allowed"
        );
        assert_eq!(
            s1.validate(&"gamma!".into()).unwrap_err().to_string(),
            "StringCol 's1': string too long (max 5, got 6)"
        );
        assert!(s1.validate(&"gamma".into()).is_ok());

        assert!(foo.auto_id_col().unwrap().validate(&Value::Null).is_ok());
        assert!(foo.column("i1").unwrap().validate(&Value::Null).is_ok());
    }

    #[test]
    fn floats_must_be_finite() {
        let col = Column::float("x");
        assert!(col.validate(&Value::Float(1.5)).is_ok());
        assert!(col.validate(&Value::Null).is_ok());

        let err = col.validate(&Value::Float(f64::NAN)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "FloatCol 'x': finite float expected, got NaN"
        );

        let err = col.validate(&Value::Float(f64::NEG_INFINITY)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "FloatCol 'x': finite float expected, got -inf"
        );
    }

    #[test]
    fn auto_id_is_never_not_null() {
        let col = Column::auto_id("id").not_null();
        assert_eq!(col.kind(), ColumnKind::AutoId);
        assert!(!col.is_not_null());
    }

    #[test]
    fn new_record() {
        let foo = foo();
        let rec = foo
            .new_record([("s1", "alpha".into()), ("foo_id", 1.into())])
            .unwrap();

        assert_eq!(rec.columns().collect::<Vec<_>>(), ["foo_id", "i1", "s1"]);
        assert_eq!(rec.get("foo_id"), Some(&Value::Int(1)));
        assert_eq!(rec.get("i1"), Some(&Value::Null));

        let err = foo.new_record([("nope", 1.into())]).unwrap_err();
        assert!(matches!(err, Error::Assertion(_)));
        assert_eq!(err.to_string(), "new(): table 'foo' has no column 'nope'");
    }

    #[test]
    #[should_panic(expected = "more than one AutoIdCol")]
    fn two_auto_ids() {
        Table::new("bad", [Column::auto_id("a"), Column::auto_id("b")]);
    }

    #[test]
    #[should_panic(expected = "duplicate column 'a'")]
    fn duplicate_columns() {
        Table::new("bad", [Column::int("a"), Column::string("a")]);
    }

    #[test]
    #[should_panic(expected = "invalid table name")]
    fn bad_identifier() {
        Table::new("foo; DROP TABLE bar", [Column::int("a")]);
    }
}
