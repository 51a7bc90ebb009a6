use std::path::Path;

use glob::Pattern;

/// Always applied. User patterns are appended to these, never replace them.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
	// OS metadata
	".ds_store",
	"._*",
	"thumbs.db",
	"desktop.ini",
	// editor swap / backup / temp
	"*.swp",
	"*.swo",
	"*.swx",
	"*~",
	".#*",
	"#*#",
	"*.tmp",
	"*.temp",
	// partial downloads
	"*.part",
	"*.partial",
	"*.crdownload",
	"*.download",
	// lock files
	"*.lock",
	"*.lck",
	"~$*",
];

/// Compiled, case-folded ignore patterns for one watch session.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
	patterns: Vec<Pattern>,
}

impl IgnoreRules {
	/// Defaults plus `extra`, in that order.
	pub fn new<I, S>(extra: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let defaults = DEFAULT_IGNORE_PATTERNS.iter().map(|p| compile(p));
		let user = extra.into_iter().map(|p| compile(p.as_ref()));
		Self {
			patterns: defaults.chain(user).flatten().collect(),
		}
	}

	pub fn defaults() -> Self {
		Self::new(std::iter::empty::<&str>())
	}

	pub fn len(&self) -> usize {
		self.patterns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	/// True if any pattern matches the bare file name or the full path.
	pub fn is_ignored(&self, path: &Path) -> bool {
		let full = path.to_string_lossy().to_lowercase();
		let name = path
			.file_name()
			.map(|n| n.to_string_lossy().to_lowercase())
			.unwrap_or_default();

		self.patterns
			.iter()
			.any(|p| (!name.is_empty() && p.matches(&name)) || p.matches(&full))
	}
}

impl Default for IgnoreRules {
	fn default() -> Self {
		Self::defaults()
	}
}

/// Malformed globs never match anything, so they are simply left out.
fn compile(pattern: &str) -> Option<Pattern> {
	Pattern::new(&pattern.to_lowercase()).ok()
}

/// One-shot form of [`IgnoreRules::is_ignored`] against an explicit pattern list.
pub fn matches<S: AsRef<str>>(path: &Path, patterns: &[S]) -> bool {
	let rules = IgnoreRules {
		patterns: patterns.iter().filter_map(|p| compile(p.as_ref())).collect(),
	};
	rules.is_ignored(path)
}
