//! Enrichment worker: drains the enrichment queue at a bounded rate,
//! calling the (optional) enrichment provider and converging each
//! procedure's `status`/`retry_count` row. The delivery mechanism is not
//! fixed by the contract — this is one in-process implementation of it;
//! an external job runner could equally own this responsibility.

use std::sync::Arc;
use std::time::Duration;

use carepoint_core::capability::{EnrichmentContext, EnrichmentProvider, EnrichmentRepository, ProcedureRepository};
use carepoint_core::model::EnrichmentStatus;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Candidates pulled per drain cycle, so one slow provider call does not
/// starve the rest of the batch indefinitely.
const BATCH_SIZE: u32 = 20;

pub struct EnrichmentWorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl EnrichmentWorkerHandle {
    pub async fn shutdown(self, deadline: Duration) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(deadline, self.join).await;
    }
}

/// Spawns the enrichment worker. Runs one drain cycle immediately, then on
/// a fixed interval until cancelled. Per-procedure failures update
/// `status`/`retry_count`/`last_error` and never abort the cycle.
pub fn spawn_enrichment_worker(
    procedures: Arc<dyn ProcedureRepository>,
    enrichments: Arc<dyn EnrichmentRepository>,
    provider: Arc<dyn EnrichmentProvider>,
    target_version: i32,
    retry_cap: u32,
    interval: Duration,
) -> EnrichmentWorkerHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let join = tokio::spawn(async move {
        drain_once(&procedures, &enrichments, &provider, target_version, retry_cap).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = task_cancel.cancelled() => break,
                _ = ticker.tick() => drain_once(&procedures, &enrichments, &provider, target_version, retry_cap).await,
            }
        }
    });

    EnrichmentWorkerHandle { cancel, join }
}

async fn drain_once(procedures: &Arc<dyn ProcedureRepository>, enrichments: &Arc<dyn EnrichmentRepository>, provider: &Arc<dyn EnrichmentProvider>, target_version: i32, retry_cap: u32) {
    let candidates = match procedures.enrichment_candidates(target_version, retry_cap).await {
        Ok(candidates) => candidates,
        Err(err) => {
            tracing::warn!(error = %err, "enrichment worker: failed to list candidates");
            return;
        }
    };

    for procedure in candidates.into_iter().take(BATCH_SIZE as usize) {
        let existing = enrichments.get(&procedure.id).await.ok().flatten();
        let retry_count = existing.as_ref().map(|e| e.retry_count).unwrap_or(0);
        let context = EnrichmentContext { category: procedure.category.clone() };

        match provider.enrich(&procedure.display_name, &context).await {
            Ok(output) => {
                let row = carepoint_core::model::ProcedureEnrichment {
                    procedure_id: procedure.id.clone(),
                    description: Some(output.description),
                    prep_steps: output.prep_steps,
                    risks: output.risks,
                    recovery: Some(output.recovery),
                    search_concepts: output.search_concepts,
                    provider_identifier: Some(provider.model_identifier().to_string()),
                    model_identifier: Some(provider.model_identifier().to_string()),
                    status: EnrichmentStatus::Succeeded,
                    enrichment_version: target_version,
                    retry_count,
                    last_error: None,
                };
                if let Err(err) = enrichments.upsert(row).await {
                    tracing::warn!(procedure_id = %procedure.id, error = %err, "enrichment worker: failed to persist success");
                }
            }
            Err(err) => {
                tracing::warn!(procedure_id = %procedure.id, error = %err, "enrichment worker: provider call failed");
                let row = carepoint_core::model::ProcedureEnrichment {
                    procedure_id: procedure.id.clone(),
                    description: existing.as_ref().and_then(|e| e.description.clone()),
                    prep_steps: existing.as_ref().map(|e| e.prep_steps.clone()).unwrap_or_default(),
                    risks: existing.as_ref().map(|e| e.risks.clone()).unwrap_or_default(),
                    recovery: existing.as_ref().and_then(|e| e.recovery.clone()),
                    search_concepts: existing.as_ref().map(|e| e.search_concepts.clone()).unwrap_or_default(),
                    provider_identifier: existing.as_ref().and_then(|e| e.provider_identifier.clone()),
                    model_identifier: Some(provider.model_identifier().to_string()),
                    status: EnrichmentStatus::Failed,
                    enrichment_version: existing.as_ref().map(|e| e.enrichment_version).unwrap_or(-1),
                    retry_count: retry_count + 1,
                    last_error: Some(err.to_string()),
                };
                if let Err(err) = enrichments.upsert(row).await {
                    tracing::warn!(procedure_id = %procedure.id, error = %err, "enrichment worker: failed to persist failure");
                }
            }
        }
    }
}
