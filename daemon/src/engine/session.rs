use std::{
	future::Future,
	path::{Path, PathBuf},
	time::Duration,
};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use trailwatch_core::{EventType, IgnoreRules, NewAuditRecord};

use super::{
	normalizer::{path_string, EventNormalizer, NormalizerConfig},
	notifications::{Notification, RenamePairing},
};
use crate::store::{AuditStore, StoreError};

/// How long an unpaired rename source waits for its destination.
const RENAME_PAIR_WINDOW: Duration = Duration::from_millis(250);

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum WatchError {
	#[error("watch folder does not exist: {0}")]
	FolderNotFound(PathBuf),

	#[error("watch path is not a folder: {0}")]
	NotADirectory(PathBuf),

	#[error("failed to subscribe to {path}: {reason}")]
	Subscribe { path: PathBuf, reason: String },

	#[error(transparent)]
	Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
	pub folder: PathBuf,
	pub recursive: bool,
	pub include_dirs: bool,
	pub hash_enabled: bool,
	pub debounce: Duration,
	pub ignore: Vec<String>,
	pub channel_capacity: usize,
}

impl WatchOptions {
	pub fn new(folder: impl Into<PathBuf>) -> Self {
		Self {
			folder: folder.into(),
			recursive: false,
			include_dirs: false,
			hash_enabled: false,
			debounce: Duration::from_secs(1),
			ignore: Vec::new(),
			channel_capacity: DEFAULT_CHANNEL_CAPACITY,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	pub received: u64,
	pub recorded: u64,
	pub suppressed: u64,
}

/// Resolve and validate the folder to watch.
pub fn resolve_folder(folder: &Path) -> Result<PathBuf, WatchError> {
	let resolved = folder
		.canonicalize()
		.map_err(|_| WatchError::FolderNotFound(folder.to_path_buf()))?;
	if !resolved.is_dir() {
		return Err(WatchError::NotADirectory(resolved));
	}
	Ok(resolved)
}

/// Watch `options.folder` until `shutdown` resolves.
///
/// Writes a `startup` record once subscribed and a `shutdown` record before
/// releasing the subscription. Notifications are handled strictly one at a
/// time; a storage fault ends the session.
pub async fn run_watch<F>(store: AuditStore, options: WatchOptions, shutdown: F) -> Result<SessionStats, WatchError>
where
	F: Future<Output = ()>,
{
	let folder = resolve_folder(&options.folder)?;
	let folder_str = path_string(&folder);

	let (tx, rx) = mpsc::channel::<notify::Result<Event>>(options.channel_capacity.max(1));
	let mut watcher = RecommendedWatcher::new(
		move |res: notify::Result<Event>| {
			// receiver gone means the session is shutting down
			let _ = tx.blocking_send(res);
		},
		Config::default(),
	)
	.map_err(|e| WatchError::Subscribe {
		path: folder.clone(),
		reason: e.to_string(),
	})?;

	let mode = if options.recursive {
		RecursiveMode::Recursive
	} else {
		RecursiveMode::NonRecursive
	};
	watcher.watch(&folder, mode).map_err(|e| WatchError::Subscribe {
		path: folder.clone(),
		reason: e.to_string(),
	})?;

	store
		.append(
			&NewAuditRecord::new(EventType::Startup, folder_str.clone())
				.with_extra("recursive", options.recursive)
				.with_extra("include_dirs", options.include_dirs)
				.with_extra("hash_enabled", options.hash_enabled),
		)
		.await?;
	info!(
		folder = %folder.display(),
		recursive = options.recursive,
		include_dirs = options.include_dirs,
		hash = options.hash_enabled,
		"watch session started"
	);

	let ignore = IgnoreRules::new(&options.ignore);
	if !ignore.is_empty() {
		debug!(patterns = ignore.len(), "ignore rules compiled");
	}
	let normalizer = EventNormalizer::new(
		store.clone(),
		NormalizerConfig {
			include_dirs: options.include_dirs,
			hash_enabled: options.hash_enabled,
			debounce: options.debounce,
			ignore,
		},
	);

	let pairing = {
		let root = folder.clone();
		let recursive = options.recursive;
		tokio::task::spawn_blocking(move || RenamePairing::scan(&root, recursive))
			.await
			.unwrap_or_else(|e| {
				warn!(error = %e, "directory scan failed; directory moves may be misclassified");
				RenamePairing::new()
			})
	};

	let outcome = consume(normalizer, pairing, rx, shutdown).await;

	let shutdown_result = store
		.append(&NewAuditRecord::new(EventType::Shutdown, folder_str))
		.await;
	if let Err(e) = watcher.unwatch(&folder) {
		debug!(error = %e, "unwatch failed during shutdown");
	}
	drop(watcher);

	let stats = outcome?;
	shutdown_result?;
	info!(
		received = stats.received,
		recorded = stats.recorded,
		suppressed = stats.suppressed,
		"watch session stopped"
	);
	Ok(stats)
}

/// Single consumer loop: one notification fully handled before the next.
async fn consume<F>(
	mut normalizer: EventNormalizer,
	mut pairing: RenamePairing,
	mut rx: mpsc::Receiver<notify::Result<Event>>,
	shutdown: F,
) -> Result<SessionStats, StoreError>
where
	F: Future<Output = ()>,
{
	let mut stats = SessionStats::default();
	tokio::pin!(shutdown);

	loop {
		let next = tokio::select! {
			biased;
			_ = &mut shutdown => break,
			next = recv_or_idle(&mut rx, pairing.has_pending()) => next,
		};

		let notifications = match next {
			Recv::Event(Ok(event)) => pairing.translate(event),
			Recv::Event(Err(e)) => {
				warn!(error = %e, "watch backend error");
				continue;
			}
			Recv::Timeout => pairing.flush().into_iter().collect(),
			Recv::Closed => break,
		};

		for n in notifications {
			dispatch(&mut normalizer, n, &mut stats).await?;
		}
	}

	if let Some(n) = pairing.flush() {
		dispatch(&mut normalizer, n, &mut stats).await?;
	}
	Ok(stats)
}

async fn dispatch(
	normalizer: &mut EventNormalizer,
	n: Notification,
	stats: &mut SessionStats,
) -> Result<(), StoreError> {
	stats.received += 1;
	let path = n.path.clone();
	match normalizer.handle(n).await {
		Ok(Some(id)) => {
			stats.recorded += 1;
			debug!(id, path = %path.display(), "recorded");
		}
		Ok(None) => stats.suppressed += 1,
		Err(e) => {
			error!(error = %e, path = %path.display(), "failed to persist audit record");
			return Err(e);
		}
	}
	Ok(())
}

enum Recv {
	Event(notify::Result<Event>),
	Timeout,
	Closed,
}

async fn recv_or_idle(rx: &mut mpsc::Receiver<notify::Result<Event>>, waiting_for_pair: bool) -> Recv {
	if waiting_for_pair {
		match tokio::time::timeout(RENAME_PAIR_WINDOW, rx.recv()).await {
			Ok(Some(res)) => Recv::Event(res),
			Ok(None) => Recv::Closed,
			Err(_) => Recv::Timeout,
		}
	} else {
		match rx.recv().await {
			Some(res) => Recv::Event(res),
			None => Recv::Closed,
		}
	}
}
