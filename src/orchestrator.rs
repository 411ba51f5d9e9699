//! One applicant, start to finish:
//! return to list, search, open application, attachments, recommendations,
//! classify. Document failures are recorded and the walk continues; only a
//! dead session aborts with an error.

use crate::events::{BatchEvent, ProgressSink};
use crate::fetcher::{DocumentFetcher, FetchError};
use crate::locator::Locator;
use crate::models::{ApplicantRecord, Config, DocumentKind, DocumentTarget};
use crate::navigator::{NavigationFailure, Navigator};
use crate::report::ApplicantOutcome;
use crate::session::{PortalSession, SessionError};
use crate::signed_url::{extract_signed_url, redact, ExtractionError};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
enum DocumentFailure {
    #[error(transparent)]
    Navigation(#[from] NavigationFailure),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no attachment section configured")]
    Unconfigured,
}

impl DocumentFailure {
    fn into_fatal(self) -> Result<Self, SessionError> {
        match self {
            DocumentFailure::Navigation(NavigationFailure::Session(err)) if err.is_fatal() => {
                Err(err)
            }
            other => Ok(other),
        }
    }
}

#[derive(Default)]
struct Tally {
    succeeded: usize,
    failed: Vec<String>,
}

impl Tally {
    fn classify(self) -> ApplicantOutcome {
        if self.failed.is_empty() {
            ApplicantOutcome::Succeeded
        } else if self.succeeded == 0 {
            ApplicantOutcome::Failed {
                reason: format!("no documents retrieved ({})", self.failed.join(", ")),
            }
        } else {
            ApplicantOutcome::Partial {
                failed: self.failed,
            }
        }
    }
}

pub struct ApplicantProcessor<'a> {
    session: &'a dyn PortalSession,
    fetcher: &'a dyn DocumentFetcher,
    config: &'a Config,
    sink: &'a dyn ProgressSink,
}

impl<'a> ApplicantProcessor<'a> {
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

    pub async fn process(
        &self,
        applicant: &ApplicantRecord,
        folder: &Path,
    ) -> Result<ApplicantOutcome, SessionError> {
        let toggles = self.config.documents;
        let mut tally = Tally::default();

        let mut pending = Vec::new();
        for kind in DocumentKind::ATTACHMENTS {
            if !toggles.is_enabled(kind) {
                continue;
            }
            let target = DocumentTarget::attachment(kind, folder);
            if target.is_complete() {
                self.skipped(&target, &mut tally);
            } else {
                pending.push(target);
            }
        }

        if pending.is_empty() && !toggles.recommendations {
            return Ok(tally.classify());
        }

        let nav = Navigator::new(self.session, self.config);
        if let Err(failure) = self.locate(&nav, applicant).await {
            return self.applicant_failed(failure);
        }

        if !pending.is_empty() {
            self.fetch_attachments(&nav, &pending, &mut tally).await?;
        }
        if toggles.recommendations {
            self.fetch_recommendations(&nav, folder, &mut tally).await?;
        }

        Ok(tally.classify())
    }

    async fn locate(
        &self,
        nav: &Navigator<'_>,
        applicant: &ApplicantRecord,
    ) -> Result<(), NavigationFailure> {
        nav.return_to_roster_list()
            .await
            .map_err(|f| self.step_failed("return to roster list", f))?;
        nav.search_and_select(applicant)
            .await
            .map_err(|f| self.step_failed("search", f))?;
        nav.open_first_application()
            .await
            .map_err(|f| self.step_failed("open application", f))?;
        Ok(())
    }

    fn step_failed(&self, step: &'static str, failure: NavigationFailure) -> NavigationFailure {
        if !failure.is_fatal() {
            self.sink.record(&BatchEvent::StepFailed {
                step,
                reason: failure.to_string(),
            });
        }
        failure
    }

    fn applicant_failed(&self, failure: NavigationFailure) -> Result<ApplicantOutcome, SessionError> {
        match failure {
            NavigationFailure::Session(err) if err.is_fatal() => Err(err),
            other => Ok(ApplicantOutcome::Failed {
                reason: other.to_string(),
            }),
        }
    }

    async fn fetch_attachments(
        &self,
        nav: &Navigator<'_>,
        pending: &[DocumentTarget],
        tally: &mut Tally,
    ) -> Result<(), SessionError> {
        let selectors = nav.selectors();
        if let Err(failure) = nav.open_section(&selectors.attachments_tab).await {
            let failure = DocumentFailure::from(failure).into_fatal()?;
            for target in pending {
                self.failed(&target.label, &failure, tally);
            }
            return Ok(());
        }

        for target in pending {
            let Some(section) = selectors.section(target.kind) else {
                self.failed(&target.label, &DocumentFailure::Unconfigured, tally);
                continue;
            };
            let viewer = Locator::css(&section.container).child(&selectors.viewer);
            let toggle = Locator::text(&section.label).first();
            let result = self.fetch_from_viewer(nav, &viewer, &toggle, target).await;
            self.settle(target, result, tally)?;
        }
        Ok(())
    }

    async fn fetch_recommendations(
        &self,
        nav: &Navigator<'_>,
        folder: &Path,
        tally: &mut Tally,
    ) -> Result<(), SessionError> {
        let selectors = nav.selectors();
        let lor = DocumentKind::LetterOfRecommendation.label();
        if let Err(failure) = nav.open_section(&selectors.recommendations_tab).await {
            let failure = DocumentFailure::from(failure).into_fatal()?;
            self.failed(lor, &failure, tally);
            return Ok(());
        }

        let mut ordinal = 0;
        let mut labels = HashSet::new();
        for container in &selectors.recommender_containers {
            let entries = Locator::css(container).child(&selectors.recommender_entry);
            let count = nav.count(&entries).await.map_err(fatal_only)?;
            debug!(container = %container, entries = count, "recommender list");

            for index in 0..count {
                ordinal += 1;
                let entry = entries.nth(index);
                let name = nav
                    .text(&entry.child(&selectors.recommender_name).first())
                    .await
                    .map_err(fatal_only)?
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("recommender_{ordinal}"));

                let mut target = DocumentTarget::recommendation(&name, folder);
                let mut suffix = ordinal;
                while !labels.insert(target.label.clone()) {
                    target = DocumentTarget::recommendation(&format!("{name}_{suffix}"), folder);
                    suffix += 1;
                }

                if target.is_complete() {
                    self.skipped(&target, tally);
                    continue;
                }

                let viewer = entry.child(&selectors.viewer);
                let toggle = entry.child(&selectors.recommender_toggle).first();
                let result = self.fetch_from_viewer(nav, &viewer, &toggle, &target).await;
                self.settle(&target, result, tally)?;
                nav.collapse(&viewer, &toggle).await.map_err(fatal_only)?;
            }
        }

        if ordinal == 0 {
            self.sink.record(&BatchEvent::DocumentFailed {
                label: lor.to_string(),
                reason: "no recommenders listed".to_string(),
            });
            tally.failed.push(lor.to_string());
        }
        Ok(())
    }

    async fn fetch_from_viewer(
        &self,
        nav: &Navigator<'_>,
        viewer: &Locator,
        toggle: &Locator,
        target: &DocumentTarget,
    ) -> Result<u64, DocumentFailure> {
        nav.expand_if_collapsed(viewer, toggle).await?;
        let source = nav.viewer_source(viewer).await?;
        let url = extract_signed_url(source.as_deref())?;
        debug!(document = %target.label, url = %redact(&url), "signed url extracted");
        let bytes = self.fetcher.fetch(&url, &target.destination).await?;
        Ok(bytes)
    }

    fn settle(
        &self,
        target: &DocumentTarget,
        result: Result<u64, DocumentFailure>,
        tally: &mut Tally,
    ) -> Result<(), SessionError> {
        match result {
            Ok(bytes) => {
                self.sink.record(&BatchEvent::DocumentSaved {
                    label: target.label.clone(),
                    bytes,
                });
                tally.succeeded += 1;
            }
            Err(failure) => {
                let failure = failure.into_fatal()?;
                self.failed(&target.label, &failure, tally);
            }
        }
        Ok(())
    }

    fn skipped(&self, target: &DocumentTarget, tally: &mut Tally) {
        self.sink.record(&BatchEvent::DocumentSkipped {
            label: target.label.clone(),
        });
        tally.succeeded += 1;
    }

    fn failed(&self, label: &str, failure: &DocumentFailure, tally: &mut Tally) {
        self.sink.record(&BatchEvent::DocumentFailed {
            label: label.to_string(),
            reason: failure.to_string(),
        });
        tally.failed.push(label.to_string());
    }
}

fn fatal_only(failure: NavigationFailure) -> SessionError {
    match failure {
        NavigationFailure::Session(err) => err,
        other => SessionError::Browser(other.to_string()),
    }
}
