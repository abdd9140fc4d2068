#![allow(dead_code)]

use binder::{Column, Config, Conn, Table};
use once_cell::sync::Lazy;
use tempfile::TempDir;

pub static FOO: Lazy<Table> = Lazy::new(|| {
    Table::new(
        "foo",
        [
            Column::auto_id("foo_id"),
            Column::int("i1"),
            Column::string("s1"),
        ],
    )
});

pub static BAR: Lazy<Table> = Lazy::new(|| {
    Table::new("bar", [Column::int("bi"), Column::string("bs")])
});

/// A fresh SQLite database file, deleted when dropped.
pub struct TestDb {
    _dir: TempDir,
    config: Config,
}

impl TestDb {
    pub fn new() -> TestDb {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("binder=debug")
            .try_init();

        let dir = tempfile::tempdir().expect("couldn't create temp dir");
        let path = dir.path().join("binder.db");
        let config = Config::new(format!("sqlite://{}", path.display()));

        TestDb { _dir: dir, config }
    }

    pub async fn connect(&self) -> Conn {
        binder::connect(&self.config)
            .await
            .expect("couldn't connect to database")
    }

    pub async fn connect_read_only(&self) -> Conn {
        binder::connect(&self.config.clone().read_only(true))
            .await
            .expect("couldn't connect to database")
    }
}
