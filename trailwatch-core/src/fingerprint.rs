use std::{
	fs,
	io::{self, Read},
	path::Path,
};

use sha2::{Digest, Sha256};

const CHUNK_SIZE: usize = 256 * 1024; // 256KB

/// Lowercase hex SHA-256 of the file content.
///
/// `None` when the path is not a regular file or cannot be read; a file that
/// vanished between the notification and now is an expected race.
pub fn hash_file(path: &Path) -> Option<String> {
	if !path.is_file() {
		return None;
	}
	sha256_file(path).ok()
}

/// Size in bytes, `None` when the path is not a regular file or cannot be stat'ed.
pub fn file_size(path: &Path) -> Option<u64> {
	match fs::metadata(path) {
		Ok(meta) if meta.is_file() => Some(meta.len()),
		_ => None,
	}
}

/// Size and, when `with_hash` is set, content hash of a path.
pub fn observe(path: &Path, with_hash: bool) -> (Option<u64>, Option<String>) {
	let size = file_size(path);
	let hash = if with_hash { hash_file(path) } else { None };
	(size, hash)
}

fn sha256_file(path: &Path) -> io::Result<String> {
	let mut file = fs::File::open(path)?;
	let mut hasher = Sha256::new();
	let mut buf = vec![0u8; CHUNK_SIZE];

	loop {
		let n = file.read(&mut buf)?;
		if n == 0 {
			break;
		}
		hasher.update(&buf[..n]);
	}

	Ok(format!("{:x}", hasher.finalize()))
}
