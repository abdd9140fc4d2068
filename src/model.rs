use crate::{Error, Record, Table};

/// This is the trait which you should derive for your structs.
///
/// It ties a struct to a [`Table`] and converts between the struct
/// and [`Record`]s, which lets [`Conn`](crate::Conn) work with it directly.
///
/// # Usage
///
/// ```
/// use binder::Model;
///
/// #[derive(Debug, PartialEq, Model)]
/// #[table(table_name = "books")]
/// struct Book {
///     #[column(auto_id)]
///     id: Option<i64>,
///     #[column(max_length = 100)]
///     title: String,
///     pages: Option<i64>,
/// }
///
/// let table = Book::table();
/// assert_eq!(table.name(), "books");
/// assert_eq!(table.auto_id_col().unwrap().name(), "id");
/// assert!(table.column("title").unwrap().is_not_null());
/// assert!(!table.column("pages").unwrap().is_not_null());
///
/// let book = Book { id: None, title: "Dune".into(), pages: Some(412) };
/// assert_eq!(Book::from_record(&book.to_record()).unwrap(), book);
/// ```
pub trait Model: Sized {
    /// The table the struct maps to.
    fn table() -> &'static Table;

    fn to_record(&self) -> Record;

    fn from_record(record: &Record) -> Result<Self, Error>;
}
