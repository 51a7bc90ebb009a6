use serde::{Deserialize, Serialize};

/// Where a recorded path landed during verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Ok,
    Changed,
    Missing,
    Unhashed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifySummary {
    pub ok: usize,
    pub changed: usize,
    pub missing: usize,
    pub unhashed: usize,
}

/// Recorded-vs-live comparison for one watched folder.
/// Field order is the order of the JSON report file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifyReport {
    pub folder: String,
    pub summary: VerifySummary,
    pub changed: Vec<String>,
    pub missing: Vec<String>,
    pub unhashed: Vec<String>,
    pub ok: Vec<String>,
}

impl VerifyReport {
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, class: Classification, path: String) {
        let (bucket, count) = match class {
            Classification::Ok => (&mut self.ok, &mut self.summary.ok),
            Classification::Changed => (&mut self.changed, &mut self.summary.changed),
            Classification::Missing => (&mut self.missing, &mut self.summary.missing),
            Classification::Unhashed => (&mut self.unhashed, &mut self.summary.unhashed),
        };
        bucket.push(path);
        *count += 1;
    }

    pub fn total(&self) -> usize {
        self.summary.ok + self.summary.changed + self.summary.missing + self.summary.unhashed
    }

    /// True when every checked path still matches its recorded hash.
    pub fn is_clean(&self) -> bool {
        self.total() == self.summary.ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_counts_and_buckets_in_step() {
        let mut report = VerifyReport::new("/data");
        report.push(Classification::Ok, "/data/a".into());
        report.push(Classification::Missing, "/data/b".into());
        report.push(Classification::Missing, "/data/c".into());

        assert_eq!(report.summary, VerifySummary { ok: 1, changed: 0, missing: 2, unhashed: 0 });
        assert_eq!(report.missing, vec!["/data/b", "/data/c"]);
        assert_eq!(report.total(), 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn json_layout_matches_report_file() {
        let mut report = VerifyReport::new("/data");
        report.push(Classification::Changed, "/data/a".into());
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"folder":"/data","summary":{"ok":0,"changed":1,"missing":0,"unhashed":0},"changed":["/data/a"],"missing":[],"unhashed":[],"ok":[]}"#
        );
    }
}
