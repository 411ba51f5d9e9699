use crate::events::{BatchEvent, ProgressSink};
use crate::fetcher::DocumentFetcher;
use crate::models::{ApplicantRecord, Config};
use crate::orchestrator::ApplicantProcessor;
use crate::report::{ApplicantOutcome, OutcomeReport};
use crate::session::PortalSession;
use std::fs;
use tracing::{error, info};

/// Walks the roster in order over one shared session. No applicant can stop
/// the batch: every outcome, including a dropped session, lands in the report.
pub struct BatchDriver<'a> {
    session: &'a dyn PortalSession,
    fetcher: &'a dyn DocumentFetcher,
    config: &'a Config,
    sink: &'a dyn ProgressSink,
}

impl<'a> BatchDriver<'a> {
    pub fn new(
        session: &'a dyn PortalSession,
        fetcher: &'a dyn DocumentFetcher,
        config: &'a Config,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            session,
            fetcher,
            config,
            sink,
        }
    }

    pub async fn run(&self, roster: &[ApplicantRecord]) -> OutcomeReport {
        let processor = ApplicantProcessor::new(self.session, self.fetcher, self.config, self.sink);
        let root = self.config.download_root();
        let total = roster.len();
        let mut report = OutcomeReport::default();

        info!(applicants = total, root = %root.display(), "batch started");
        for (i, applicant) in roster.iter().enumerate() {
            let name = applicant.display_name();
            self.sink.record(&BatchEvent::ApplicantStarted {
                index: i + 1,
                total,
                applicant: name.clone(),
            });

            let folder = root.join(applicant.folder_name());
            let outcome = match fs::create_dir_all(&folder) {
                Err(err) => ApplicantOutcome::Failed {
                    reason: format!("cannot create {}: {}", folder.display(), err),
                },
                Ok(()) => match processor.process(applicant, &folder).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(applicant = %name, error = %err, "applicant aborted");
                        ApplicantOutcome::Failed {
                            reason: format!("error: {err}"),
                        }
                    }
                },
            };

            self.sink.record(&BatchEvent::ApplicantFinished {
                applicant: name.clone(),
                outcome: outcome.clone(),
            });
            report.record(name, outcome);
        }
        info!(
            succeeded = report.succeeded.len(),
            partial = report.partial.len(),
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }
}
