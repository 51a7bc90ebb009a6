use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use console::style;
use trailwatch_core::{models::format_event_time, AuditRecord, EventType, VerifyReport};

/// One line per record: `#id | time | type | src[ -> dest]`.
pub fn format_row(record: &AuditRecord, show_hash: bool) -> String {
	let arrow = record
		.dest_path
		.as_deref()
		.map(|dest| format!(" -> {dest}"))
		.unwrap_or_default();
	let mut line = format!(
		"#{} | {} | {} | {}{}",
		record.id,
		format_event_time(&record.event_time),
		record.event_type,
		record.src_path,
		arrow
	);
	if show_hash {
		let size = record
			.file_size_bytes
			.map(|s| format!("{s} B"))
			.unwrap_or_else(|| "-".into());
		let hash = record.sha256.as_deref().unwrap_or("-");
		line.push_str(&format!(" | {size} | {hash}"));
	}
	line
}

/// Records arrive newest first; print them oldest first, like `tail`.
pub fn print_rows(records: &[AuditRecord], show_hash: bool) {
	for record in records.iter().rev() {
		let line = format_row(record, show_hash);
		let styled = match record.event_type {
			EventType::Created => style(line).green(),
			EventType::Deleted => style(line).red(),
			EventType::Moved => style(line).cyan(),
			EventType::Startup | EventType::Shutdown => style(line).dim(),
			EventType::Modified => style(line),
		};
		println!("{styled}");
	}
}

pub fn print_report(report: &VerifyReport) {
	println!("Verified {} recorded file(s) under {}", report.total(), report.folder);
	println!(
		"  ok: {}  changed: {}  missing: {}  unhashed: {}",
		style(report.summary.ok).green(),
		style(report.summary.changed).yellow(),
		style(report.summary.missing).red(),
		style(report.summary.unhashed).dim(),
	);
	if report.is_clean() {
		println!("{}", style("All recorded hashes match.").green());
		return;
	}
	for (label, paths) in [
		("changed", &report.changed),
		("missing", &report.missing),
		("unhashed", &report.unhashed),
	] {
		for path in paths {
			println!("  {label:<8} {path}");
		}
	}
}

/// `--since` accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (UTC) or a bare date.
pub fn parse_since(s: &str) -> Result<DateTime<Utc>, String> {
	let s = s.trim();
	if let Ok(t) = DateTime::parse_from_rfc3339(s) {
		return Ok(t.with_timezone(&Utc));
	}
	if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
		return Ok(t.and_utc());
	}
	if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
		if let Some(t) = d.and_hms_opt(0, 0, 0) {
			return Ok(t.and_utc());
		}
	}
	Err(format!("invalid timestamp {s:?} (expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD)"))
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;

	use super::*;

	fn record(event_type: EventType) -> AuditRecord {
		AuditRecord {
			id: 7,
			event_time: Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
			event_type,
			src_path: "/data/a.txt".into(),
			dest_path: None,
			file_size_bytes: None,
			sha256: None,
			extra: None,
		}
	}

	#[test]
	fn row_without_hash_column() {
		assert_eq!(
			format_row(&record(EventType::Created), false),
			"#7 | 2025-01-02T03:04:05.000000Z | created | /data/a.txt"
		);
	}

	#[test]
	fn moved_row_shows_arrow_and_hash() {
		let mut r = record(EventType::Moved);
		r.dest_path = Some("/data/b.txt".into());
		r.file_size_bytes = Some(12);
		r.sha256 = Some("abc".into());
		assert_eq!(
			format_row(&r, true),
			"#7 | 2025-01-02T03:04:05.000000Z | moved | /data/a.txt -> /data/b.txt | 12 B | abc"
		);
	}

	#[test]
	fn missing_hash_prints_dash() {
		assert!(format_row(&record(EventType::Deleted), true).ends_with(" | - | -"));
	}

	#[test]
	fn since_accepts_three_forms() {
		let midnight = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
		assert_eq!(parse_since("2025-03-01").unwrap(), midnight);
		assert_eq!(parse_since("2025-03-01T00:00:00").unwrap(), midnight);
		assert_eq!(parse_since("2025-03-01T02:00:00+02:00").unwrap(), midnight);
		assert!(parse_since("yesterday").is_err());
	}
}
