use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use trailwatch_core::{fingerprint, Classification, VerifyReport};

use super::normalizer::path_string;
use crate::store::{AuditStore, StoreError};

#[derive(Debug, Error)]
pub enum VerifyError {
	#[error(transparent)]
	Store(#[from] StoreError),

	#[error("verification task failed: {0}")]
	Task(String),
}

/// Compare the latest recorded hash of every path under `folder` with the
/// file as it is now. Read-only against the store.
///
/// Recorded paths outside `folder` are skipped; they may belong to a session
/// that watched a different root.
pub async fn verify(folder: &Path, store: &AuditStore) -> Result<VerifyReport, VerifyError> {
	let root = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());
	let recorded = store.latest_hashes_by_path().await?;
	let total = recorded.len();

	let candidates: Vec<(PathBuf, String)> = recorded
		.into_iter()
		.map(|(path, hash)| (PathBuf::from(path), hash))
		.filter(|(path, _)| path.starts_with(&root))
		.collect();
	debug!(total, in_folder = candidates.len(), "verifying recorded hashes");

	let folder_label = path_string(&root);
	let report = tokio::task::spawn_blocking(move || {
		let mut report = VerifyReport::new(folder_label);
		for (path, recorded_hash) in candidates {
			let class = classify(&path, &recorded_hash);
			report.push(class, path_string(&path));
		}
		report
	})
	.await
	.map_err(|e| VerifyError::Task(e.to_string()))?;

	info!(
		folder = %report.folder,
		ok = report.summary.ok,
		changed = report.summary.changed,
		missing = report.summary.missing,
		unhashed = report.summary.unhashed,
		"verification finished"
	);
	Ok(report)
}

fn classify(path: &Path, recorded_hash: &str) -> Classification {
	if std::fs::symlink_metadata(path).is_err() {
		return Classification::Missing;
	}
	match fingerprint::hash_file(path) {
		None => Classification::Unhashed,
		Some(current) if current == recorded_hash => Classification::Ok,
		Some(_) => Classification::Changed,
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use trailwatch_core::{EventType, NewAuditRecord, VerifySummary};

	use super::*;
	use crate::db::open_in_memory;

	async fn store() -> AuditStore {
		AuditStore::open(open_in_memory().await.unwrap()).await.unwrap()
	}

	async fn record_hash(store: &AuditStore, path: &Path) {
		let hash = fingerprint::hash_file(path);
		assert!(hash.is_some());
		store
			.append(&NewAuditRecord::new(EventType::Created, path_string(path)).with_hash(hash))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn classifies_ok_changed_missing() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().canonicalize().unwrap();
		let (same, edited, gone) = (root.join("same.txt"), root.join("edited.txt"), root.join("gone.txt"));
		for p in [&same, &edited, &gone] {
			fs::write(p, "original").unwrap();
		}

		let store = store().await;
		for p in [&same, &edited, &gone] {
			record_hash(&store, p).await;
		}

		fs::write(&edited, "rewritten").unwrap();
		fs::remove_file(&gone).unwrap();

		let report = verify(&root, &store).await.unwrap();
		assert_eq!(report.folder, path_string(&root));
		assert_eq!(report.summary, VerifySummary { ok: 1, changed: 1, missing: 1, unhashed: 0 });
		assert_eq!(report.ok, vec![path_string(&same)]);
		assert_eq!(report.changed, vec![path_string(&edited)]);
		assert_eq!(report.missing, vec![path_string(&gone)]);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn unreadable_file_is_unhashed() {
		use std::os::unix::fs::PermissionsExt;

		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().canonicalize().unwrap();
		let locked = root.join("locked.txt");
		fs::write(&locked, "secret").unwrap();

		let store = store().await;
		record_hash(&store, &locked).await;
		fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

		// root ignores file modes; nothing to assert there
		if fs::File::open(&locked).is_ok() {
			return;
		}

		let report = verify(&root, &store).await.unwrap();
		assert_eq!(report.unhashed, vec![path_string(&locked)]);
		assert_eq!(report.summary.unhashed, 1);
	}

	#[tokio::test]
	async fn paths_outside_folder_are_skipped() {
		let watched = tempfile::tempdir().unwrap();
		let other = tempfile::tempdir().unwrap();
		let inside = watched.path().canonicalize().unwrap().join("in.txt");
		let outside = other.path().canonicalize().unwrap().join("out.txt");
		fs::write(&inside, "a").unwrap();
		fs::write(&outside, "b").unwrap();

		let store = store().await;
		record_hash(&store, &inside).await;
		record_hash(&store, &outside).await;

		let report = verify(watched.path(), &store).await.unwrap();
		assert_eq!(report.total(), 1);
		assert_eq!(report.ok, vec![path_string(&inside)]);
	}

	#[tokio::test]
	async fn verify_is_repeatable_and_read_only() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().canonicalize().unwrap();
		let file = root.join("a.txt");
		fs::write(&file, "a").unwrap();

		let store = store().await;
		record_hash(&store, &file).await;
		let before = store.count().await.unwrap();

		let first = verify(&root, &store).await.unwrap();
		let second = verify(&root, &store).await.unwrap();
		assert_eq!(first, second);
		assert_eq!(store.count().await.unwrap(), before);
	}

	#[tokio::test]
	async fn sibling_prefix_is_not_contained() {
		let tmp = tempfile::tempdir().unwrap();
		let root = tmp.path().canonicalize().unwrap();
		fs::create_dir(root.join("data")).unwrap();
		fs::create_dir(root.join("data-old")).unwrap();
		let stale = root.join("data-old/a.txt");
		fs::write(&stale, "a").unwrap();

		let store = store().await;
		record_hash(&store, &stale).await;

		let report = verify(&root.join("data"), &store).await.unwrap();
		assert_eq!(report.total(), 0);
	}
}
