use std::{
	collections::HashSet,
	path::{Path, PathBuf},
};

use notify::{
	event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
	Event, EventKind,
};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
	Create,
	Modify,
	Delete,
	Move,
}

/// A typed change notification for one path (two for moves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub kind: NotificationKind,
	pub path: PathBuf,
	pub dest_path: Option<PathBuf>,
	pub is_directory: bool,
}

impl Notification {
	pub fn create(path: impl Into<PathBuf>, is_directory: bool) -> Self {
		Self::single(NotificationKind::Create, path.into(), is_directory)
	}

	pub fn modify(path: impl Into<PathBuf>, is_directory: bool) -> Self {
		Self::single(NotificationKind::Modify, path.into(), is_directory)
	}

	pub fn delete(path: impl Into<PathBuf>, is_directory: bool) -> Self {
		Self::single(NotificationKind::Delete, path.into(), is_directory)
	}

	pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>, is_directory: bool) -> Self {
		Self {
			kind: NotificationKind::Move,
			path: from.into(),
			dest_path: Some(to.into()),
			is_directory,
		}
	}

	fn single(kind: NotificationKind, path: PathBuf, is_directory: bool) -> Self {
		Self {
			kind,
			path,
			dest_path: None,
			is_directory,
		}
	}
}

/// Turns raw `notify` events into [`Notification`]s.
///
/// Backends report renames differently: inotify sends `From`, `To` and then a
/// paired `Both`; Windows sends `From` and `To` only; FSEvents sends `Any` per
/// path. A `From` is held until the next event so it can pair with a `To`.
///
/// Paths that vanished cannot be stat'ed, so directories seen in the tree are
/// remembered in `known_dirs` to classify their deletes and unpaired moves.
#[derive(Debug, Default)]
pub struct RenamePairing {
	pending_from: Option<PathBuf>,
	last_move: Option<(PathBuf, PathBuf)>,
	known_dirs: HashSet<PathBuf>,
}

impl RenamePairing {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed `known_dirs` with the directories under `root` (direct children
	/// only unless `recursive`).
	pub fn scan(root: &Path, recursive: bool) -> Self {
		let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
		if !recursive {
			walker = walker.max_depth(1);
		}

		let known_dirs = walker
			.into_iter()
			.filter_map(Result::ok)
			.filter(|entry| entry.file_type().is_dir())
			.map(|entry| entry.into_path())
			.collect();

		Self {
			known_dirs,
			..Self::default()
		}
	}

	pub fn has_pending(&self) -> bool {
		self.pending_from.is_some()
	}

	pub fn is_known_dir(&self, path: &Path) -> bool {
		self.known_dirs.contains(path)
	}

	/// An unpaired `From` becomes a delete: the path left the watched tree.
	pub fn flush(&mut self) -> Option<Notification> {
		let from = self.pending_from.take()?;
		let was_dir = self.forget(&from);
		Some(Notification::delete(from, was_dir))
	}

	pub fn translate(&mut self, event: Event) -> Vec<Notification> {
		let mut out = Vec::new();

		match event.kind {
			EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
				out.extend(self.flush());
				self.pending_from = event.paths.into_iter().next();
				return out;
			}
			EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
				let Some(to) = event.paths.into_iter().next() else {
					return out;
				};
				match self.pending_from.take() {
					Some(from) => {
						let is_dir = self.relocate(&from, &to);
						self.last_move = Some((from.clone(), to.clone()));
						out.push(Notification::moved(from, to, is_dir));
					}
					None => {
						let is_dir = self.observe(&to);
						out.push(Notification::create(to, is_dir));
					}
				}
				return out;
			}
			EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
				self.pending_from = None;
				let mut paths = event.paths.into_iter();
				if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
					let pair = (from, to);
					if self.last_move.as_ref() != Some(&pair) {
						let is_dir = self.relocate(&pair.0, &pair.1);
						out.push(Notification::moved(pair.0, pair.1, is_dir));
					}
				}
				self.last_move = None;
				return out;
			}
			_ => {}
		}

		out.extend(self.flush());
		self.last_move = None;

		match event.kind {
			EventKind::Create(kind) => {
				for path in event.paths {
					let is_dir = self.observe(&path) || kind == CreateKind::Folder;
					if is_dir {
						self.known_dirs.insert(path.clone());
					}
					out.push(Notification::create(path, is_dir));
				}
			}
			EventKind::Remove(kind) => {
				for path in event.paths {
					let was_dir = self.forget(&path) || kind == RemoveKind::Folder;
					out.push(Notification::delete(path, was_dir));
				}
			}
			EventKind::Modify(ModifyKind::Name(_)) => {
				// no pairing information: decide by whether the path is still there
				for path in event.paths {
					if std::fs::symlink_metadata(&path).is_ok() {
						let is_dir = self.observe(&path);
						out.push(Notification::create(path, is_dir));
					} else {
						let was_dir = self.forget(&path);
						out.push(Notification::delete(path, was_dir));
					}
				}
			}
			EventKind::Modify(_) => {
				for path in event.paths {
					let is_dir = self.is_known_dir(&path) || is_dir(&path);
					out.push(Notification::modify(path, is_dir));
				}
			}
			EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
		}

		out
	}

	/// Stat a path that exists now; remember it if it is a directory.
	fn observe(&mut self, path: &Path) -> bool {
		let dir = is_dir(path);
		if dir {
			self.known_dirs.insert(path.to_path_buf());
		}
		dir
	}

	/// Drop `path` and everything below it. Returns whether `path` was a directory.
	fn forget(&mut self, path: &Path) -> bool {
		let was_dir = self.known_dirs.contains(path);
		if was_dir {
			self.known_dirs.retain(|dir| !dir.starts_with(path));
		}
		was_dir
	}

	/// Carry directories under `from` over to `to`. Returns whether the moved
	/// path is a directory.
	fn relocate(&mut self, from: &Path, to: &Path) -> bool {
		let was_dir = self.known_dirs.contains(from);
		if was_dir {
			let moved: Vec<PathBuf> = self
				.known_dirs
				.iter()
				.filter(|dir| dir.starts_with(from))
				.cloned()
				.collect();
			for dir in moved {
				self.known_dirs.remove(&dir);
				if let Ok(rest) = dir.strip_prefix(from) {
					let target = if rest.as_os_str().is_empty() {
						to.to_path_buf()
					} else {
						to.join(rest)
					};
					self.known_dirs.insert(target);
				}
			}
		}
		self.observe(to) || was_dir
	}
}

fn is_dir(path: &Path) -> bool {
	std::fs::symlink_metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
