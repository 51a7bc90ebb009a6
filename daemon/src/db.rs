use std::{
	path::{Path, PathBuf},
	str::FromStr,
	time::Duration,
};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

/// How long a connection waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, Error)]
pub enum DbError {
	#[error("cannot create database directory {path}: {source}")]
	CreateDir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot open database {path}: {source}")]
	Open {
		path: PathBuf,
		#[source]
		source: sqlx::Error,
	},

	#[error("schema migration failed: {0}")]
	Migrate(#[source] sqlx::Error),
}

/// Wrapper around the SQLite connection pool.
/// Clone is cheap (Arc internally).
#[derive(Debug, Clone)]
pub struct DbHandle {
	pub pool: SqlitePool,
}

/// Open (creating if needed) the on-disk database at `path` and run migrations.
///
/// The file is put in WAL mode so readers in other processes (`tail`,
/// `search`, `verify`) keep working while a watch session writes.
pub async fn open(path: &Path) -> Result<DbHandle, DbError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
			path: parent.to_path_buf(),
			source,
		})?;
	}

	let options = SqliteConnectOptions::new()
		.filename(path)
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(BUSY_TIMEOUT);

	let pool = SqlitePoolOptions::new()
		.max_connections(MAX_CONNECTIONS)
		.connect_with(options)
		.await
		.map_err(|source| DbError::Open {
			path: path.to_path_buf(),
			source,
		})?;

	connect(pool).await
}

/// Throwaway database, used by tests.
pub async fn open_in_memory() -> Result<DbHandle, DbError> {
	let open_err = |source: sqlx::Error| DbError::Open {
		path: PathBuf::from(":memory:"),
		source,
	};
	let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(open_err)?;

	// Every in-memory connection is its own database: keep exactly one alive.
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await
		.map_err(open_err)?;

	connect(pool).await
}

async fn connect(pool: SqlitePool) -> Result<DbHandle, DbError> {
	let handle = DbHandle { pool };
	run_migrations(&handle).await?;
	Ok(handle)
}

/// Run schema migrations. Every statement is `IF NOT EXISTS` and leaves
/// existing rows alone.
pub async fn run_migrations(handle: &DbHandle) -> Result<(), DbError> {
	for statement in SCHEMA_V1 {
		sqlx::query(statement)
			.execute(&handle.pool)
			.await
			.map_err(DbError::Migrate)?;
	}
	Ok(())
}

const SCHEMA_V1: &[&str] = &[
	"CREATE TABLE IF NOT EXISTS audit_event (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_time TEXT NOT NULL,
        event_type TEXT NOT NULL
            CHECK (event_type IN ('created', 'modified', 'deleted', 'moved', 'startup', 'shutdown')),
        src_path TEXT NOT NULL,
        dest_path TEXT,
        file_size_bytes INTEGER CHECK (file_size_bytes IS NULL OR file_size_bytes >= 0),
        sha256 TEXT,
        extra_json TEXT
    )",
	"CREATE INDEX IF NOT EXISTS idx_audit_event_time ON audit_event (event_time)",
	"CREATE INDEX IF NOT EXISTS idx_audit_event_type ON audit_event (event_type)",
	"CREATE INDEX IF NOT EXISTS idx_audit_src_path ON audit_event (src_path)",
];
