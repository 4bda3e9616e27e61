#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;
use tessera::{Config, Database};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test subscriber once; `RUST_LOG=tessera=debug` shows engine events.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

/// Persistent database in a fresh temporary directory.
pub struct TestDb {
    pub dir: TempDir,
    pub db: Database,
}

impl TestDb {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let db = Database::create(Config::at(dir.path().join("db"))).unwrap();
        TestDb { dir, db }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("db")
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.db_path().join("tables")
    }

    pub fn columns_dir(&self) -> PathBuf {
        self.db_path().join("columns")
    }

    /// Closes the database and opens it again from disk.
    pub fn reopen(self) -> Self {
        let TestDb { dir, db } = self;
        db.close().unwrap();
        let db = Database::open(Config::at(dir.path().join("db"))).unwrap();
        TestDb { dir, db }
    }
}

pub fn temporary_db() -> Database {
    init_tracing();
    Database::temporary()
}
