use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{Conn, Error};

/// Connection settings, managed by Figment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Where to connect to.
    /// One of `sqlite::memory:`, `sqlite://<path>` or `postgres://...`.
    /// Env: `BINDER_URL`. Default: `sqlite://binder.db`.
    #[serde(default = "default_url")]
    pub url: String,

    /// Reject every write made through connections opened with this config.
    /// Env: `BINDER_READ_ONLY`. Default: `false`.
    #[serde(default)]
    pub read_only: bool,

    /// Maximum number of pooled PostgreSQL connections.
    /// Env: `BINDER_MAX_POOL_SIZE`. Default: `4`.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

/// The database a URL points to.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    SqliteMemory,
    SqliteFile(&'a str),
    Postgres(&'a str),
}

fn default_url() -> String {
    "sqlite://binder.db".to_string()
}

const fn default_max_pool_size() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            read_only: false,
            max_pool_size: default_max_pool_size(),
        }
    }
}

impl Config {
    /// A config for `url` with every other setting at its default.
    pub fn new(url: impl Into<String>) -> Config {
        Config {
            url: url.into(),
            ..Config::default()
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Config {
        self.read_only = read_only;
        self
    }

    /// Builds a Figment that merges defaults, `Binder.toml` and
    /// `BINDER_`-prefixed environment variables, in that order.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("Binder.toml"))
            .merge(Env::prefixed("BINDER_"))
    }

    /// Loads the configuration and checks that the URL is usable.
    pub fn load() -> Result<Config, Error> {
        let config: Config = Self::figment().extract()?;
        config.target()?;

        Ok(config)
    }

    fn target(&self) -> Result<Target<'_>, Error> {
        let url = self.url.as_str();

        if url == "sqlite::memory:" {
            return Ok(Target::SqliteMemory);
        }
        if let Some(path) = url.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(Error::Config(format!("missing sqlite path in '{url}'")));
            }
            return Ok(Target::SqliteFile(path));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(Target::Postgres(url));
        }

        Err(Error::Config(format!("unsupported database url '{url}'")))
    }
}

/// Open a [`Conn`] to the database `config` points to.
///
/// SQLite connections are opened per call. PostgreSQL connections are
/// checked out of a pool shared by every `connect` to the same url (see
/// [`PgPool::shared`](crate::PgPool::shared)) and return to it when the
/// `Conn` is dropped.
pub async fn connect(config: &Config) -> Result<Conn, Error> {
    match config.target()? {
        #[cfg(feature = "sqlite")]
        Target::SqliteMemory => {
            let backend = crate::backend::SqliteBackend::open_in_memory()?;
            Ok(Conn::new(Box::new(backend), config.read_only))
        }
        #[cfg(feature = "sqlite")]
        Target::SqliteFile(path) => {
            let backend = crate::backend::SqliteBackend::open(path, config.read_only)?;
            Ok(Conn::new(Box::new(backend), config.read_only))
        }
        #[cfg(feature = "postgres")]
        Target::Postgres(url) => {
            crate::PgPool::shared(url, config.max_pool_size)?
                .read_only(config.read_only)
                .conn()
                .await
        }
        #[allow(unreachable_patterns)]
        _ => Err(Error::Config(format!(
            "no backend for '{}' enabled in this build",
            config.url
        ))),
    }
}
