use anyhow::Result;
use csv::Writer;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicantOutcome {
    Succeeded,
    /// Labels of the enabled documents that could not be fetched.
    Partial { failed: Vec<String> },
    Failed { reason: String },
}

impl ApplicantOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ApplicantOutcome::Succeeded => "succeeded",
            ApplicantOutcome::Partial { .. } => "partial",
            ApplicantOutcome::Failed { .. } => "failed",
        }
    }
}

/// Per-applicant results of one batch run, in roster order within each
/// bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeReport {
    pub succeeded: Vec<String>,
    pub partial: Vec<(String, Vec<String>)>,
    pub failed: Vec<(String, String)>,
}

impl OutcomeReport {
    pub fn record(&mut self, applicant: String, outcome: ApplicantOutcome) {
        match outcome {
            ApplicantOutcome::Succeeded => self.succeeded.push(applicant),
            ApplicantOutcome::Partial { failed } => self.partial.push((applicant, failed)),
            ApplicantOutcome::Failed { reason } => self.failed.push((applicant, reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.partial.len() + self.failed.len()
    }

    pub fn render_summary(&self, download_root: &Path) -> String {
        let mut content = String::new();
        content.push_str(&format!("\n{}\n", "=".repeat(60)));
        content.push_str(&format!(
            "COMPLETE: {} succeeded, {} partial, {} failed (of {})\n",
            self.succeeded.len(),
            self.partial.len(),
            self.failed.len(),
            self.total()
        ));

        if !self.partial.is_empty() {
            content.push_str("\n⚠️  Partial (missing documents):\n");
            for (applicant, failed) in &self.partial {
                content.push_str(&format!("  - {}: {}\n", applicant, failed.join(", ")));
            }
        }

        if !self.failed.is_empty() {
            content.push_str("\n❌ Failed:\n");
            for (applicant, reason) in &self.failed {
                content.push_str(&format!("  - {} - {}\n", applicant, reason));
            }
        }

        if !self.partial.is_empty() || !self.failed.is_empty() {
            content.push_str("\nRe-run to retry; documents already on disk are skipped.\n");
        }

        content.push_str(&format!("\n📂 Files saved to: {}\n", download_root.display()));
        content.push_str(&"=".repeat(60));
        content
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record(["applicant", "status", "detail"])?;

        for applicant in &self.succeeded {
            writer.write_record([applicant.as_str(), "succeeded", ""])?;
        }
        for (applicant, failed) in &self.partial {
            writer.write_record([applicant.as_str(), "partial", failed.join("; ").as_str()])?;
        }
        for (applicant, reason) in &self.failed {
            writer.write_record([applicant.as_str(), "failed", reason.as_str()])?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OutcomeReport {
        let mut report = OutcomeReport::default();
        report.record("Ana Lee".to_string(), ApplicantOutcome::Succeeded);
        report.record(
            "Bo Kim".to_string(),
            ApplicantOutcome::Partial {
                failed: vec!["cv".to_string(), "lor_Dr__Ray".to_string()],
            },
        );
        report.record(
            "Cy Ode".to_string(),
            ApplicantOutcome::Failed {
                reason: "not found".to_string(),
            },
        );
        report
    }

    #[test]
    fn record_sorts_outcomes_into_buckets() {
        let report = sample();
        assert_eq!(report.succeeded, vec!["Ana Lee".to_string()]);
        assert_eq!(report.partial[0].1, vec!["cv".to_string(), "lor_Dr__Ray".to_string()]);
        assert_eq!(report.failed, vec![("Cy Ode".to_string(), "not found".to_string())]);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn summary_lists_reasons() {
        let summary = sample().render_summary(Path::new("out"));
        assert!(summary.contains("COMPLETE: 1 succeeded, 1 partial, 1 failed (of 3)"));
        assert!(summary.contains("  - Bo Kim: cv, lor_Dr__Ray"));
        assert!(summary.contains("  - Cy Ode - not found"));
        assert!(summary.contains("Re-run to retry"));
    }

    #[test]
    fn clean_run_has_no_retry_hint() {
        let mut report = OutcomeReport::default();
        report.record("Ana Lee".to_string(), ApplicantOutcome::Succeeded);
        assert!(!report.render_summary(Path::new("out")).contains("Re-run"));
    }

    #[test]
    fn csv_has_one_row_per_applicant() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("download_report.csv");
        sample().write_csv(&path).expect("csv written");

        let content = std::fs::read_to_string(&path).expect("read csv");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "applicant,status,detail");
        assert_eq!(lines[1], "Ana Lee,succeeded,");
        assert_eq!(lines[2], "Bo Kim,partial,cv; lor_Dr__Ray");
        assert_eq!(lines[3], "Cy Ode,failed,not found");
    }
}
