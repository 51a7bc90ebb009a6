//! Filesystem audit policy: the record model, ignore rules, modify debouncing
//! and content fingerprints. No I/O beyond reading the files being fingerprinted.

pub mod debounce;
pub mod fingerprint;
pub mod ignore;
pub mod models;

pub use debounce::DebounceGate;
pub use ignore::{IgnoreRules, DEFAULT_IGNORE_PATTERNS};
pub use models::{AuditRecord, Classification, EventType, NewAuditRecord, VerifyReport, VerifySummary};
