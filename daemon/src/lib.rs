//! Audit pipeline runtime: storage, the watch session that turns filesystem
//! notifications into audit records, and verification against live files.

pub mod db;
pub mod engine;
pub mod store;

pub use db::{DbError, DbHandle};
pub use engine::{
	normalizer::{EventNormalizer, NormalizerConfig},
	notifications::{Notification, NotificationKind, RenamePairing},
	session::{resolve_folder, run_watch, SessionStats, WatchError, WatchOptions, DEFAULT_CHANNEL_CAPACITY},
	verifier::{verify, VerifyError},
};
pub use store::{AuditStore, SearchFilter, StoreError};
