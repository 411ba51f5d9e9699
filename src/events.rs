use crate::report::ApplicantOutcome;

/// Progress notifications raised while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    ApplicantStarted {
        index: usize,
        total: usize,
        applicant: String,
    },
    StepFailed {
        step: &'static str,
        reason: String,
    },
    DocumentSkipped {
        label: String,
    },
    DocumentSaved {
        label: String,
        bytes: u64,
    },
    DocumentFailed {
        label: String,
        reason: String,
    },
    ApplicantFinished {
        applicant: String,
        outcome: ApplicantOutcome,
    },
}

/// Injectable reporting sink. The batch never writes progress anywhere else.
pub trait ProgressSink: Send + Sync {
    fn record(&self, event: &BatchEvent);
}

/// Running progress lines on stdout.
pub struct ConsoleSink;

impl ProgressSink for ConsoleSink {
    fn record(&self, event: &BatchEvent) {
        match event {
            BatchEvent::ApplicantStarted {
                index,
                total,
                applicant,
            } => println!("\n[{}/{}] {}", index, total, applicant),
            BatchEvent::StepFailed { step, reason } => {
                println!("   ⚠️  {} failed: {}", step, reason)
            }
            BatchEvent::DocumentSkipped { label } => {
                println!("   ⏭️  {}: already downloaded, skipping", label)
            }
            BatchEvent::DocumentSaved { label, bytes } => {
                println!("   ✅ Saved: {}.pdf  ({} KB)", label, bytes / 1024)
            }
            BatchEvent::DocumentFailed { label, reason } => {
                println!("   ❌ {}: {}", label, reason)
            }
            BatchEvent::ApplicantFinished { outcome, .. } => match outcome {
                ApplicantOutcome::Succeeded => println!("   🎉 Complete"),
                ApplicantOutcome::Partial { failed } => {
                    println!("   ⚠️  Partial, missing: {}", failed.join(", "))
                }
                ApplicantOutcome::Failed { reason } => println!("   ❌ Failed: {}", reason),
            },
        }
    }
}

/// Mirrors events into the structured log.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn record(&self, event: &BatchEvent) {
        match event {
            BatchEvent::ApplicantStarted {
                index,
                total,
                applicant,
            } => tracing::info!(index, total, %applicant, "processing applicant"),
            BatchEvent::StepFailed { step, reason } => {
                tracing::warn!(step, %reason, "navigation step failed")
            }
            BatchEvent::DocumentSkipped { label } => {
                tracing::info!(document = %label, "already on disk, skipped")
            }
            BatchEvent::DocumentSaved { label, bytes } => {
                tracing::info!(document = %label, bytes, "document saved")
            }
            BatchEvent::DocumentFailed { label, reason } => {
                tracing::error!(document = %label, %reason, "document failed")
            }
            BatchEvent::ApplicantFinished { applicant, outcome } => {
                tracing::info!(%applicant, outcome = %outcome.status(), "applicant finished")
            }
        }
    }
}

/// Fans one event out to several sinks.
pub struct SinkSet(pub Vec<Box<dyn ProgressSink>>);

impl ProgressSink for SinkSet {
    fn record(&self, event: &BatchEvent) {
        for sink in &self.0 {
            sink.record(event);
        }
    }
}
