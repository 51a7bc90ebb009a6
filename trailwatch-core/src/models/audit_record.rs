use std::{fmt, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happened to a path, or which session boundary was crossed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Modified,
    Deleted,
    Moved,
    Startup,
    Shutdown,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Created,
        EventType::Modified,
        EventType::Deleted,
        EventType::Moved,
        EventType::Startup,
        EventType::Shutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Modified => "modified",
            EventType::Deleted => "deleted",
            EventType::Moved => "moved",
            EventType::Startup => "startup",
            EventType::Shutdown => "shutdown",
        }
    }

    /// Session boundary records, not observations of a file.
    pub fn is_synthetic(self) -> bool {
        matches!(self, EventType::Startup | EventType::Shutdown)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown event type: {0} (expected one of created, modified, deleted, moved, startup, shutdown)")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Canonical text form of an event time: RFC 3339, UTC, microseconds, `Z`.
/// Fixed width, so lexical order is chronological order.
pub fn format_event_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_event_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// An audit record that has not been persisted yet.
/// The store assigns the id on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditRecord {
    pub event_time: DateTime<Utc>,
    pub event_type: EventType,
    pub src_path: String,
    pub dest_path: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub sha256: Option<String>,
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NewAuditRecord {
    /// Record dated now.
    pub fn new(event_type: EventType, src_path: impl Into<String>) -> Self {
        Self {
            event_time: Utc::now(),
            event_type,
            src_path: src_path.into(),
            dest_path: None,
            file_size_bytes: None,
            sha256: None,
            extra: None,
        }
    }

    pub fn at(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn with_dest(mut self, dest_path: impl Into<String>) -> Self {
        self.dest_path = Some(dest_path.into());
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.file_size_bytes = size;
        self
    }

    pub fn with_hash(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256;
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn extra_json(&self) -> Option<String> {
        self.extra
            .as_ref()
            .map(|map| serde_json::Value::Object(map.clone()).to_string())
    }
}

/// One immutable row of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    pub id: i64,
    pub event_time: DateTime<Utc>,
    pub event_type: EventType,
    pub src_path: String,
    pub dest_path: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub sha256: Option<String>,
    pub extra: Option<serde_json::Value>,
}

impl AuditRecord {
    /// The path whose content `sha256` and `file_size_bytes` describe.
    pub fn observed_path(&self) -> &str {
        match (self.event_type, &self.dest_path) {
            (EventType::Moved, Some(dest)) => dest,
            _ => &self.src_path,
        }
    }

    /// For a move, the path the content left. It no longer has a known hash.
    pub fn vacated_path(&self) -> Option<&str> {
        match (self.event_type, &self.dest_path) {
            (EventType::Moved, Some(_)) => Some(&self.src_path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn event_type_round_trips_through_text() {
        for t in EventType::ALL {
            assert_eq!(t.to_string().parse::<EventType>().unwrap(), t);
        }
        assert_eq!("  Moved ".parse::<EventType>().unwrap(), EventType::Moved);
        assert!("renamed".parse::<EventType>().is_err());
    }

    #[test]
    fn event_time_text_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let (a, b) = (format_event_time(&early), format_event_time(&late));
        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
        assert!(a < b);
        assert_eq!(parse_event_time(&b), Some(late));
    }

    #[test]
    fn extra_serializes_as_json_object() {
        let record = NewAuditRecord::new(EventType::Created, "/data/a.txt").with_extra("is_directory", false);
        assert_eq!(record.extra_json().as_deref(), Some(r#"{"is_directory":false}"#));
        assert_eq!(NewAuditRecord::new(EventType::Deleted, "/x").extra_json(), None);
    }

    #[test]
    fn moved_records_describe_their_destination() {
        let record = AuditRecord {
            id: 1,
            event_time: Utc::now(),
            event_type: EventType::Moved,
            src_path: "/data/old.txt".into(),
            dest_path: Some("/data/new.txt".into()),
            file_size_bytes: Some(3),
            sha256: None,
            extra: None,
        };
        assert_eq!(record.observed_path(), "/data/new.txt");
        assert_eq!(record.vacated_path(), Some("/data/old.txt"));
    }

    #[test]
    fn plain_records_observe_their_source() {
        let record = AuditRecord {
            id: 2,
            event_time: Utc::now(),
            event_type: EventType::Modified,
            src_path: "/data/a.txt".into(),
            dest_path: None,
            file_size_bytes: None,
            sha256: Some("ab".into()),
            extra: None,
        };
        assert_eq!(record.observed_path(), "/data/a.txt");
        assert_eq!(record.vacated_path(), None);
        assert!(!record.event_type.is_synthetic());
        assert!(EventType::Startup.is_synthetic());
    }
}
