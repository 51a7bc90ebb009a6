use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;
use tracing::debug;
use trailwatch_core::models::{format_event_time, parse_event_time, AuditRecord, EventType, NewAuditRecord};

use crate::db::{self, DbError, DbHandle};

#[derive(Debug, Error)]
pub enum StoreError {
	#[error(transparent)]
	Db(#[from] DbError),

	#[error("database query failed: {0}")]
	Query(#[from] sqlx::Error),

	#[error("file size {size} of {path} does not fit the audit column")]
	SizeOutOfRange { path: String, size: u64 },

	#[error("corrupt audit row #{id}: {reason}")]
	CorruptRow { id: i64, reason: String },
}

/// Filters for [`AuditStore::search`]. Unset filters impose no constraint.
#[derive(Debug, Clone)]
pub struct SearchFilter {
	pub event_type: Option<EventType>,
	/// Substring of either `src_path` or `dest_path`.
	pub contains: Option<String>,
	/// Inclusive lower bound on `event_time`.
	pub since: Option<DateTime<Utc>>,
	pub limit: usize,
}

impl SearchFilter {
	pub fn new(limit: usize) -> Self {
		Self {
			event_type: None,
			contains: None,
			since: None,
			limit,
		}
	}
}

/// Append-only audit trail.
///
/// Ids come from SQLite's `AUTOINCREMENT`: strictly increasing across every
/// process writing the file, and never reused after a rolled-back insert.
#[derive(Debug, Clone)]
pub struct AuditStore {
	handle: DbHandle,
}

/// Row shape as selected from `audit_event`.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
	id: i64,
	event_time: String,
	event_type: String,
	src_path: String,
	dest_path: Option<String>,
	file_size_bytes: Option<i64>,
	sha256: Option<String>,
	extra_json: Option<String>,
}

impl TryFrom<AuditRow> for AuditRecord {
	type Error = StoreError;

	fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
		let corrupt = |reason: String| StoreError::CorruptRow { id: row.id, reason };

		let event_time = parse_event_time(&row.event_time)
			.ok_or_else(|| corrupt(format!("bad event_time {:?}", row.event_time)))?;
		let event_type = row.event_type.parse::<EventType>().map_err(|e| corrupt(e.to_string()))?;
		let file_size_bytes = row
			.file_size_bytes
			.map(u64::try_from)
			.transpose()
			.map_err(|_| corrupt(format!("negative file size {:?}", row.file_size_bytes)))?;
		let extra = row
			.extra_json
			.as_deref()
			.map(serde_json::from_str::<serde_json::Value>)
			.transpose()
			.map_err(|e| corrupt(format!("bad extra_json: {e}")))?;

		Ok(AuditRecord {
			id: row.id,
			event_time,
			event_type,
			src_path: row.src_path,
			dest_path: row.dest_path,
			file_size_bytes,
			sha256: row.sha256,
			extra,
		})
	}
}

const SELECT_COLUMNS: &str = "id, event_time, event_type, src_path, dest_path, file_size_bytes, sha256, extra_json";

impl AuditStore {
	/// Ensure the schema exists.
	pub async fn open(handle: DbHandle) -> Result<Self, StoreError> {
		db::run_migrations(&handle).await?;
		debug!("audit store opened");
		Ok(Self { handle })
	}

	/// Persist one record and return its id. Committed before returning.
	pub async fn append(&self, record: &NewAuditRecord) -> Result<i64, StoreError> {
		let size = record
			.file_size_bytes
			.map(|size| {
				i64::try_from(size).map_err(|_| StoreError::SizeOutOfRange {
					path: record.src_path.clone(),
					size,
				})
			})
			.transpose()?;

		let result = sqlx::query(
			"INSERT INTO audit_event
                (event_time, event_type, src_path, dest_path, file_size_bytes, sha256, extra_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(format_event_time(&record.event_time))
		.bind(record.event_type.as_str())
		.bind(record.src_path.as_str())
		.bind(record.dest_path.as_deref())
		.bind(size)
		.bind(record.sha256.as_deref())
		.bind(record.extra_json())
		.execute(&self.handle.pool)
		.await?;

		Ok(result.last_insert_rowid())
	}

	/// Most recent `limit` records, newest first.
	pub async fn latest(&self, limit: usize) -> Result<Vec<AuditRecord>, StoreError> {
		self.search(&SearchFilter::new(limit)).await
	}

	/// Records matching every set filter, newest first.
	pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<AuditRecord>, StoreError> {
		let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {SELECT_COLUMNS} FROM audit_event WHERE 1 = 1"));

		if let Some(event_type) = filter.event_type {
			builder.push(" AND event_type = ").push_bind(event_type.as_str());
		}
		if let Some(needle) = &filter.contains {
			builder
				.push(" AND (instr(src_path, ")
				.push_bind(needle.clone())
				.push(") > 0 OR instr(COALESCE(dest_path, ''), ")
				.push_bind(needle.clone())
				.push(") > 0)");
		}
		if let Some(since) = &filter.since {
			builder.push(" AND event_time >= ").push_bind(format_event_time(since));
		}
		builder
			.push(" ORDER BY id DESC LIMIT ")
			.push_bind(i64::try_from(filter.limit).unwrap_or(i64::MAX));

		let rows: Vec<AuditRow> = builder.build_query_as().fetch_all(&self.handle.pool).await?;
		rows.into_iter().map(AuditRecord::try_from).collect()
	}

	/// Latest known hash for every path whose newest observation carries one.
	///
	/// A `moved` record observes its destination with its hash and its source
	/// with no hash. Session boundary records observe nothing.
	pub async fn latest_hashes_by_path(&self) -> Result<BTreeMap<String, String>, StoreError> {
		let rows: Vec<AuditRow> = sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM audit_event ORDER BY id DESC"))
			.fetch_all(&self.handle.pool)
			.await?;

		let mut seen = HashSet::new();
		let mut hashes = BTreeMap::new();

		for row in rows {
			let record = AuditRecord::try_from(row)?;
			if record.event_type.is_synthetic() {
				continue;
			}

			let observations = [
				Some((record.observed_path(), record.sha256.as_deref())),
				record.vacated_path().map(|path| (path, None)),
			];
			for (path, hash) in observations.into_iter().flatten() {
				if seen.insert(path.to_string()) {
					if let Some(hash) = hash {
						hashes.insert(path.to_string(), hash.to_string());
					}
				}
			}
		}

		Ok(hashes)
	}

	pub async fn count(&self) -> Result<u64, StoreError> {
		let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_event")
			.fetch_one(&self.handle.pool)
			.await?;
		Ok(u64::try_from(total).unwrap_or_default())
	}
}
