mod audit_record;
mod report;

pub use audit_record::{
    format_event_time, parse_event_time, AuditRecord, EventType, NewAuditRecord, UnknownEventType,
};
pub use report::{Classification, VerifyReport, VerifySummary};
