//! Sequential batch driver and its report.

use super::item::{ItemResult, WorkItem};
use super::Orchestrator;

/// What happened to every item of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Items that ran, in order, keyed by source reference.
    pub results: Vec<(String, ItemResult)>,
    /// Items never started because the batch halted or was aborted.
    pub skipped: Vec<String>,
    /// Reason of the fatal outcome that halted the batch.
    pub halted: Option<String>,
    pub aborted: bool,
}

impl BatchReport {
    pub fn uploaded(&self) -> usize {
        self.results.iter().filter(|(_, r)| matches!(r, ItemResult::Success { .. })).count()
    }

    pub fn already_uploaded(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, ItemResult::AlreadyUploaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, r)| matches!(r, ItemResult::Failed { .. })).count()
    }

    /// True if every item ended uploaded (now or earlier) and nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.halted.is_none()
            && !self.aborted
            && self.skipped.is_empty()
            && self.results.iter().all(|(_, r)| r.is_success())
    }
}

impl Orchestrator {
    /// Process `items` one after another until done, halted by a fatal
    /// outcome, or aborted. Results of earlier items are always kept.
    pub async fn run_batch(&self, items: &[WorkItem]) -> BatchReport {
        let mut report = BatchReport::default();
        if let Some(ledger) = &self.ledger {
            match ledger.recover_in_progress().await {
                Ok(0) => {}
                Ok(n) => tracing::info!(rows = n, "reset items left in progress by an earlier run"),
                Err(e) => tracing::warn!(error = %e, "ledger recovery failed"),
            }
        }

        for (i, item) in items.iter().enumerate() {
            if self.abort.is_aborted() {
                tracing::warn!(remaining = items.len() - i, "batch aborted");
                report.aborted = true;
                report.skipped = items[i..].iter().map(|it| it.source_ref.clone()).collect();
                break;
            }
            tracing::info!(item = i + 1, of = items.len(), source = %item.source_ref, "processing item");
            let result = self.process_item(item).await;
            let fatal = match &result {
                ItemResult::Fatal { reason } => Some(reason.clone()),
                _ => None,
            };
            report.results.push((item.source_ref.clone(), result));
            if let Some(reason) = fatal {
                tracing::error!(reason = %reason, remaining = items.len() - i - 1, "halting batch");
                report.halted = Some(reason);
                report.skipped = items[i + 1..].iter().map(|it| it.source_ref.clone()).collect();
                break;
            }
        }
        // An abort during the last item leaves nothing to skip but still counts.
        if self.abort.is_aborted() {
            report.aborted = true;
        }

        tracing::info!(
            uploaded = report.uploaded(),
            already_uploaded = report.already_uploaded(),
            failed = report.failed(),
            skipped = report.skipped.len(),
            "batch finished"
        );
        report
    }
}
