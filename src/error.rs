use thiserror::Error;

/// The error type returned by every fallible `binder` operation.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller broke the contract of an operation.
    #[error(transparent)]
    Assertion(#[from] AssertionError),
    /// A value does not match the type of its column.
    #[error(transparent)]
    Type(#[from] TypeError),
    /// The database reported an error.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid pool configuration")]
    InvalidPoolConfig,
    #[error("couldn't retrieve a connection from the pool")]
    NoConnectionInPool,
}

/// A contract violation, like asking for a row by id on a table
/// which has no `AutoIdCol`.
///
/// Some assertions carry structured context, see [`AssertionError::info`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionError {
    message: String,
    info: Option<AssertionInfo>,
}

/// Context attached to assertions raised while querying a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionInfo {
    /// The name of the queried table.
    pub table_name: String,
    /// The rendered condition, e.g. `i1 = 101`.
    pub condition: String,
}

/// A value was handed to a column of a different type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TypeError {
    message: String,
}

/// An error reported by the underlying database driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    message: String,
}

impl AssertionError {
    pub(crate) fn new(message: impl Into<String>) -> AssertionError {
        AssertionError {
            message: message.into(),
            info: None,
        }
    }

    pub(crate) fn with_info(
        message: impl Into<String>,
        table_name: impl Into<String>,
        condition: impl Into<String>,
    ) -> AssertionError {
        AssertionError {
            message: message.into(),
            info: Some(AssertionInfo {
                table_name: table_name.into(),
                condition: condition.into(),
            }),
        }
    }

    /// The bare assertion message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured context, if the assertion has any.
    pub fn info(&self) -> Option<&AssertionInfo> {
        self.info.as_ref()
    }
}

impl TypeError {
    pub(crate) fn new(message: impl Into<String>) -> TypeError {
        TypeError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl DbError {
    pub(crate) fn new(message: impl Into<String>) -> DbError {
        DbError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::new(value.to_string())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::Db(value.into())
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DbError {
    fn from(value: tokio_postgres::Error) -> Self {
        // Prefer the server's message over the driver's "db error: ..." wrapper.
        match value.as_db_error() {
            Some(db) => DbError::new(db.message()),
            None => DbError::new(value.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for Error {
    fn from(value: tokio_postgres::Error) -> Self {
        Error::Db(value.into())
    }
}

impl From<figment::Error> for Error {
    fn from(value: figment::Error) -> Self {
        Error::Config(value.to_string())
    }
}
