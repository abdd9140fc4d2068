//! A lighter and slightly adapted version of `deadpool-postgres`.
use std::{
    ops::{Deref, DerefMut},
    str::FromStr,
    sync::{Mutex, PoisonError},
};

use deadpool::managed::{self, Object};
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use tokio::task::JoinHandle;
use tokio_postgres::{Client as PgClient, Config as PgConfig, NoTls};
use tracing::{info, warn};

use crate::{backend::PgBackend, Conn, Error};

/// A wrapper around connections to make them poolable.
pub type Client = Object<Manager>;

/// The pools handed out by [`PgPool::shared`], by connection string.
static POOLS: Lazy<Mutex<HashMap<String, PgPool>>> = Lazy::new(Default::default);

/// A pool of PostgreSQL connections handing out [`Conn`]s.
///
/// # Example
///
/// ```ignore
/// let pool = PgPool::new("postgres://me:me@localhost:5432", 4)?;
/// let conn = pool.conn().await?;
/// conn.create_table(&FOO).await?;
/// conn.commit().await?;
/// ```
#[derive(Clone, Debug)]
pub struct PgPool {
    pool: managed::Pool<Manager>,
    read_only: bool,
}

/// A wrapper around a [tokio_postgres::Client] with a spawned off `Connection`.
#[derive(Debug)]
pub struct ClientWrapper {
    inner: PgClient,
    conn_handle: JoinHandle<()>,
}

/// The pool manager which creates/recycles Clients when they are returned/destroyed.
#[derive(Debug)]
pub struct Manager {
    config: PgConfig,
}

impl PgPool {
    /// Set up the pool. Does not actually connect until
    /// the first `Conn` is retrieved.
    pub fn new(connection_string: &str, max_size: usize) -> Result<PgPool, Error> {
        let config = PgConfig::from_str(connection_string).map_err(|_| Error::InvalidPoolConfig)?;

        let pool = managed::Pool::builder(Manager { config })
            .max_size(max_size)
            .build()
            .map_err(|_| Error::InvalidPoolConfig)?;
        info!(max_size, "built postgres connection pool");

        Ok(PgPool {
            pool,
            read_only: false,
        })
    }

    /// Get the pool for `connection_string` which lives for the rest of
    /// the process, building it on first use.
    ///
    /// This is what [`connect`](crate::connect) uses. Later calls for the
    /// same connection string share the pool and keep its `max_size`.
    pub fn shared(connection_string: &str, max_size: usize) -> Result<PgPool, Error> {
        let mut pools = POOLS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pools.get(connection_string) {
            return Ok(pool.clone());
        }

        let pool = PgPool::new(connection_string, max_size)?;
        pools.insert(connection_string.to_string(), pool.clone());

        Ok(pool)
    }

    /// The maximum number of clients the pool keeps.
    pub fn max_size(&self) -> usize {
        self.pool.status().max_size
    }

    /// The number of clients currently open, in use or idle.
    pub fn size(&self) -> usize {
        self.pool.status().size
    }

    /// Hand out read-only `Conn`s.
    pub fn read_only(mut self, read_only: bool) -> PgPool {
        self.read_only = read_only;
        self
    }

    /// Check a client out of the pool and wrap it in a [`Conn`].
    ///
    /// The client returns to the pool when the `Conn` is dropped,
    /// discarding any uncommitted writes.
    pub async fn conn(&self) -> Result<Conn, Error> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|_| Error::NoConnectionInPool)?;

        Ok(Conn::new(Box::new(PgBackend::new(client)), self.read_only))
    }
}

#[async_trait::async_trait]
impl managed::Manager for Manager {
    type Type = ClientWrapper;
    type Error = Error;

    async fn create(&self) -> Result<ClientWrapper, Error> {
        // Create a new connection
        let (client, conn) = self.config.connect(NoTls).await?;
        // "Start" the connection by spawning a new task
        let handle = tokio::spawn(async move {
            if let Err(err) = conn.await {
                warn!(%err, "postgres connection closed");
            }
        });

        Ok(ClientWrapper {
            inner: client,
            conn_handle: handle,
        })
    }

    async fn recycle(&self, client: &mut ClientWrapper) -> managed::RecycleResult<Error> {
        if client.is_closed() {
            return Err(managed::RecycleError::StaticMessage(
                "client couldn't be recycled as it's closed",
            ));
        }

        // Discard whatever transaction a dropped `Conn` left open.
        if let Err(err) = client.batch_execute("ROLLBACK").await {
            warn!(%err, "couldn't reset pooled client");
            return Err(managed::RecycleError::Backend(err.into()));
        }

        Ok(())
    }
}

impl Deref for ClientWrapper {
    type Target = PgClient;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ClientWrapper {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Drop for ClientWrapper {
    fn drop(&mut self) {
        self.conn_handle.abort();
    }
}
