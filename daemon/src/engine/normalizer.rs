use std::{
	path::{Path, PathBuf},
	time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use trailwatch_core::{fingerprint, DebounceGate, EventType, IgnoreRules, NewAuditRecord};

use super::notifications::{Notification, NotificationKind};
use crate::store::{AuditStore, StoreError};

/// Per-session filtering policy.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
	pub include_dirs: bool,
	pub hash_enabled: bool,
	pub debounce: Duration,
	pub ignore: IgnoreRules,
}

impl Default for NormalizerConfig {
	fn default() -> Self {
		Self {
			include_dirs: false,
			hash_enabled: false,
			debounce: Duration::from_secs(1),
			ignore: IgnoreRules::defaults(),
		}
	}
}

/// Converts one notification into zero or one persisted audit record.
///
/// Filter chain: directory inclusion, ignore rules (both endpoints of a move),
/// then debounce for modifications only.
#[derive(Debug)]
pub struct EventNormalizer {
	store: AuditStore,
	include_dirs: bool,
	hash_enabled: bool,
	ignore: IgnoreRules,
	debounce: DebounceGate,
}

impl EventNormalizer {
	pub fn new(store: AuditStore, config: NormalizerConfig) -> Self {
		Self {
			store,
			include_dirs: config.include_dirs,
			hash_enabled: config.hash_enabled,
			ignore: config.ignore,
			debounce: DebounceGate::new(config.debounce),
		}
	}

	pub fn store(&self) -> &AuditStore {
		&self.store
	}

	/// Handle a notification now. Returns the new record id, or `None` when the
	/// notification was filtered out.
	pub async fn handle(&mut self, notification: Notification) -> Result<Option<i64>, StoreError> {
		self.handle_at(notification, Instant::now(), Utc::now()).await
	}

	/// Like [`handle`](Self::handle) with explicit monotonic and wall clocks.
	pub async fn handle_at(
		&mut self,
		notification: Notification,
		now: Instant,
		event_time: DateTime<Utc>,
	) -> Result<Option<i64>, StoreError> {
		let Some(record) = self.normalize(notification, now, event_time).await else {
			return Ok(None);
		};
		self.store.append(&record).await.map(Some)
	}

	async fn normalize(
		&mut self,
		n: Notification,
		now: Instant,
		event_time: DateTime<Utc>,
	) -> Option<NewAuditRecord> {
		if n.is_directory && !self.include_dirs {
			return None;
		}
		if self.ignore.is_ignored(&n.path) {
			return None;
		}
		if let Some(dest) = &n.dest_path {
			if self.ignore.is_ignored(dest) {
				return None;
			}
		}

		let src = path_string(&n.path);

		let record = match n.kind {
			NotificationKind::Create => {
				let (size, hash) = self.observe(n.path.clone()).await;
				NewAuditRecord::new(EventType::Created, src).with_size(size).with_hash(hash)
			}
			NotificationKind::Modify => {
				if !self.debounce.should_log(&src, now) {
					return None;
				}
				let (size, hash) = self.observe(n.path.clone()).await;
				NewAuditRecord::new(EventType::Modified, src).with_size(size).with_hash(hash)
			}
			NotificationKind::Delete => NewAuditRecord::new(EventType::Deleted, src),
			NotificationKind::Move => {
				let dest = n.dest_path.clone()?;
				let (size, hash) = self.observe(dest.clone()).await;
				NewAuditRecord::new(EventType::Moved, src)
					.with_dest(path_string(&dest))
					.with_size(size)
					.with_hash(hash)
			}
		};

		Some(record.at(event_time).with_extra("is_directory", n.is_directory))
	}

	/// Stat (and hash) off the async runtime. Failures are absent values.
	async fn observe(&self, path: PathBuf) -> (Option<u64>, Option<String>) {
		let with_hash = self.hash_enabled;
		tokio::task::spawn_blocking(move || fingerprint::observe(&path, with_hash))
			.await
			.unwrap_or((None, None))
	}
}

pub(crate) fn path_string(path: &Path) -> String {
	path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
	use std::fs;

	use chrono::TimeZone;

	use super::*;
	use crate::db::open_in_memory;

	async fn normalizer(config: NormalizerConfig) -> EventNormalizer {
		let store = AuditStore::open(open_in_memory().await.unwrap()).await.unwrap();
		EventNormalizer::new(store, config)
	}

	fn hashing() -> NormalizerConfig {
		NormalizerConfig {
			hash_enabled: true,
			debounce: Duration::from_secs(5),
			..NormalizerConfig::default()
		}
	}

	#[tokio::test]
	async fn created_file_gets_size_and_hash() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("a.txt");
		fs::write(&path, "hello").unwrap();

		let mut n = normalizer(hashing()).await;
		let id = n.handle(Notification::create(&path, false)).await.unwrap();
		assert_eq!(id, Some(1));

		let rec = n.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.event_type, EventType::Created);
		assert_eq!(rec.src_path, path.to_string_lossy());
		assert_eq!(rec.file_size_bytes, Some(5));
		assert_eq!(
			rec.sha256.as_deref(),
			Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
		);
		assert_eq!(rec.extra, Some(serde_json::json!({ "is_directory": false })));
	}

	#[tokio::test]
	async fn hashing_disabled_leaves_hash_null() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("a.txt");
		fs::write(&path, "hello").unwrap();

		let mut n = normalizer(NormalizerConfig::default()).await;
		n.handle(Notification::create(&path, false)).await.unwrap();

		let rec = n.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.file_size_bytes, Some(5));
		assert_eq!(rec.sha256, None);
	}

	#[tokio::test]
	async fn vanished_file_is_still_recorded() {
		let mut n = normalizer(hashing()).await;
		let id = n
			.handle(Notification::create("/tmp/trailwatch_vanished_before_stat.txt", false))
			.await
			.unwrap();
		assert!(id.is_some());

		let rec = n.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.file_size_bytes, None);
		assert_eq!(rec.sha256, None);
	}

	#[tokio::test]
	async fn deletes_carry_no_size_or_hash() {
		let tmp = tempfile::tempdir().unwrap();
		let path = tmp.path().join("a.txt");
		fs::write(&path, "still here somehow").unwrap();

		let mut n = normalizer(hashing()).await;
		n.handle(Notification::delete(&path, false)).await.unwrap();

		let rec = n.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.event_type, EventType::Deleted);
		assert_eq!((rec.file_size_bytes, rec.sha256), (None, None));
	}

	#[tokio::test]
	async fn directories_dropped_unless_included() {
		let tmp = tempfile::tempdir().unwrap();

		let mut files_only = normalizer(NormalizerConfig::default()).await;
		assert_eq!(files_only.handle(Notification::create(tmp.path(), true)).await.unwrap(), None);

		let mut with_dirs = normalizer(NormalizerConfig {
			include_dirs: true,
			..NormalizerConfig::default()
		})
		.await;
		assert_eq!(with_dirs.handle(Notification::create(tmp.path(), true)).await.unwrap(), Some(1));
		let rec = with_dirs.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.file_size_bytes, None);
		assert_eq!(rec.extra, Some(serde_json::json!({ "is_directory": true })));
	}

	#[tokio::test]
	async fn ignored_paths_produce_nothing() {
		let mut n = normalizer(NormalizerConfig {
			ignore: IgnoreRules::new(["*.log"]),
			..NormalizerConfig::default()
		})
		.await;
		for notification in [
			Notification::create("/w/sub/.DS_Store", false),
			Notification::modify("/w/foo.TMP", false),
			Notification::delete("/w/app.LOG", false),
		] {
			assert_eq!(n.handle(notification).await.unwrap(), None);
		}
		assert_eq!(n.store().count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn move_with_ignored_endpoint_is_dropped_whole() {
		let mut n = normalizer(NormalizerConfig::default()).await;
		assert_eq!(n.handle(Notification::moved("/w/report.docx", "/w/report.docx.tmp", false)).await.unwrap(), None);
		assert_eq!(n.handle(Notification::moved("/w/~$report.docx", "/w/report.docx", false)).await.unwrap(), None);
		assert_eq!(n.store().count().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn move_is_sized_and_hashed_on_destination() {
		let tmp = tempfile::tempdir().unwrap();
		let dest = tmp.path().join("new.txt");
		fs::write(&dest, "hello").unwrap();
		let src = tmp.path().join("old.txt");

		let mut n = normalizer(hashing()).await;
		n.handle(Notification::moved(&src, &dest, false)).await.unwrap();

		let rec = n.store().latest(1).await.unwrap().remove(0);
		assert_eq!(rec.event_type, EventType::Moved);
		assert_eq!(rec.src_path, src.to_string_lossy());
		assert_eq!(rec.dest_path.as_deref(), Some(&*dest.to_string_lossy()));
		assert_eq!(rec.file_size_bytes, Some(5));
		assert!(rec.sha256.is_some());
	}

	#[tokio::test]
	async fn modify_burst_writes_one_record_dated_at_first() {
		let mut n = normalizer(hashing()).await;
		let t = Instant::now();
		let first_time = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

		let mut written = 0;
		for i in 0..5u32 {
			let now = t + Duration::from_millis(400) * i;
			let at = first_time + chrono::Duration::milliseconds(400 * i as i64);
			if n.handle_at(Notification::modify("/w/a.txt", false), now, at).await.unwrap().is_some() {
				written += 1;
			}
		}
		assert_eq!(written, 1);

		let recs = n.store().latest(10).await.unwrap();
		assert_eq!(recs.len(), 1);
		assert_eq!(recs[0].event_time, first_time);
	}

	#[tokio::test]
	async fn creates_and_deletes_are_never_debounced() {
		let mut n = normalizer(hashing()).await;
		let t = Instant::now();
		let at = Utc::now();
		for kind in [Notification::create("/w/a", false), Notification::delete("/w/a", false)] {
			for _ in 0..2 {
				assert!(n.handle_at(kind.clone(), t, at).await.unwrap().is_some());
			}
		}
		assert_eq!(n.store().count().await.unwrap(), 4);
	}

	#[tokio::test]
	async fn modify_after_window_is_logged_again() {
		let mut n = normalizer(hashing()).await;
		let t = Instant::now();
		let at = Utc::now();
		assert!(n.handle_at(Notification::modify("/w/a", false), t, at).await.unwrap().is_some());
		assert!(n
			.handle_at(Notification::modify("/w/a", false), t + Duration::from_secs(5), at)
			.await
			.unwrap()
			.is_some());
	}
}
