use std::{
	collections::HashMap,
	time::{Duration, Instant},
};

/// Per-path gate for `modified` notifications.
///
/// The window is measured from the last accepted event for a path; suppressed
/// events do not push it forward. Owned by one watch session and dropped with it.
#[derive(Debug)]
pub struct DebounceGate {
	window: Duration,
	last_logged: HashMap<String, Instant>,
}

impl DebounceGate {
	pub fn new(window: Duration) -> Self {
		Self {
			window,
			last_logged: HashMap::new(),
		}
	}

	/// Returns true (and records `now`) when a modification of `path` should be logged.
	pub fn should_log(&mut self, path: &str, now: Instant) -> bool {
		match self.last_logged.get(path) {
			Some(last) if now.saturating_duration_since(*last) < self.window => false,
			_ => {
				self.last_logged.insert(path.to_string(), now);
				true
			}
		}
	}

	/// Number of paths with an accepted modification.
	pub fn tracked(&self) -> usize {
		self.last_logged.len()
	}
}
