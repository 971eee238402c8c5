//! Orchestrator (C9): the per-batch driver. Fans out across rows with a
//! bounded worker pool, applies a holistic per-row deadline, persists
//! results, and retries only on infrastructural persistence errors.
//!
//! The concurrency pattern (a `Semaphore` sized to the worker count plus
//! `join_all` over per-row tasks) mirrors `llm::batch::BatchExecutor`,
//! generalized from "one LLM call per item" to "one full row pipeline per
//! item".

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info_span, Instrument};

use crate::config::Config;
use crate::contact::ContactDiscoveryController;
use crate::model::CompanyInput;
use crate::normalize;
use crate::record::ResolvedRecord;
use crate::resolver::DomainResolver;
use crate::store::JobStore;

const PERSIST_RETRY_BACKOFF: Duration = Duration::from_millis(250);
const PERSIST_MAX_RETRIES: u32 = 3;

/// Process-wide exit codes, matching the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Fatal = 1,
    ConfigError = 2,
    PartialFailure = 3,
}

/// Aggregate outcome of running a batch.
#[derive(Debug)]
pub struct BatchReport {
    pub records: Vec<(String, ResolvedRecord)>,
    pub failed_count: usize,
    pub total_count: usize,
}

impl BatchReport {
    pub fn exit_code(&self, failure_threshold_fraction: f64) -> ExitCode {
        if self.total_count == 0 {
            return ExitCode::Success;
        }
        let failure_rate = self.failed_count as f64 / self.total_count as f64;
        if failure_rate > failure_threshold_fraction {
            ExitCode::PartialFailure
        } else {
            ExitCode::Success
        }
    }
}

/// The services a single row's pipeline needs. Constructed once and
/// shared (read-only, behind `Arc`) across every worker.
pub struct PipelineServices {
    pub domain_resolver: DomainResolver,
    pub contact_controller: ContactDiscoveryController,
    pub store: JobStore,
}

pub struct Orchestrator {
    services: Arc<PipelineServices>,
    config: Config,
}

impl Orchestrator {
    pub fn new(services: Arc<PipelineServices>, config: Config) -> Self {
        Self { services, config }
    }

    /// Run the full batch with the configured worker-pool concurrency.
    pub async fn run_batch(&self, inputs: Vec<CompanyInput>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let deadline_secs = self.config.thresholds.per_row_deadline_secs;
        let total_count = inputs.len();

        let tasks: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let semaphore = Arc::clone(&semaphore);
                let services = Arc::clone(&self.services);
                let row_id = input.id.clone();
                let span = info_span!("row_worker", row_id = %row_id);

                async move {
                    let _permit = semaphore.acquire().await.expect("worker pool semaphore closed");
                    let record = Self::run_row(services, input, deadline_secs).await;
                    (row_id, record)
                }
                .instrument(span)
            })
            .collect();

        let results = join_all(tasks).await;

        let mut records = Vec::with_capacity(results.len());
        let mut failed_count = 0;
        for (row_id, record) in results {
            if record.needs_manual_review && record.domain.is_none() && record.contacts.is_empty() {
                failed_count += 1;
            }
            records.push((row_id, record));
        }

        BatchReport {
            records,
            failed_count,
            total_count,
        }
    }

    async fn run_row(services: Arc<PipelineServices>, input: CompanyInput, deadline_secs: u64) -> ResolvedRecord {
        let row_id = input.id.clone();
        let started_at = Utc::now();
        let _ = services.store.enqueue(&row_id);
        let _ = services.store.mark_processing(&row_id, started_at);

        let deadline = Instant::now() + Duration::from_secs(deadline_secs);
        let normalized = normalize::normalize(input);

        let resolution = match services.domain_resolver.resolve(&normalized, deadline).await {
            Ok(r) => r,
            Err(e) => {
                return Self::persist_and_return(
                    &services.store,
                    &row_id,
                    ResolvedRecord::new(
                        row_id.clone(),
                        None,
                        0.0,
                        None,
                        vec![],
                        vec![],
                        0.0,
                        vec![e.truncated_message(1000)],
                        true,
                    ),
                )
                .await
            }
        };

        let discovery = services
            .contact_controller
            .run(&normalized, resolution.domain.as_deref(), deadline)
            .await;

        let (contacts, contact_stages, contact_cost, mut errors) = match discovery {
            Ok(outcome) => (
                outcome.contacts,
                outcome.stages_completed.into_iter().map(|s| s.stage).collect::<Vec<_>>(),
                outcome.total_cost,
                Vec::new(),
            ),
            Err(e) => (Vec::new(), Vec::new(), 0.0, vec![e.truncated_message(1000)]),
        };

        errors.extend(resolution.errors);

        let mut stages = resolution.stages_completed;
        stages.extend(contact_stages);

        let record = ResolvedRecord::new(
            row_id.clone(),
            resolution.domain,
            resolution.confidence,
            resolution.source,
            contacts,
            stages,
            resolution.total_cost + contact_cost,
            errors,
            resolution.needs_manual_review,
        );

        Self::persist_and_return(&services.store, &row_id, record).await
    }

    async fn persist_and_return(store: &JobStore, row_id: &str, record: ResolvedRecord) -> ResolvedRecord {
        let completed_at = Utc::now();
        let mut attempt = 0;
        loop {
            let outcome = store.save_result(row_id, &record, completed_at);
            match outcome {
                Ok(()) => return record,
                Err(e) if attempt < PERSIST_MAX_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(PERSIST_RETRY_BACKOFF * attempt).await;
                    let _ = e;
                }
                Err(e) => {
                    let _ = store.mark_failed(row_id, completed_at, &e);
                    return record;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_below_threshold_is_success() {
        let report = BatchReport {
            records: vec![],
            failed_count: 1,
            total_count: 100,
        };
        assert_eq!(report.exit_code(0.05), ExitCode::Success);
    }

    #[test]
    fn exit_code_above_threshold_is_partial_failure() {
        let report = BatchReport {
            records: vec![],
            failed_count: 20,
            total_count: 100,
        };
        assert_eq!(report.exit_code(0.05), ExitCode::PartialFailure);
    }

    #[test]
    fn empty_batch_is_success() {
        let report = BatchReport {
            records: vec![],
            failed_count: 0,
            total_count: 0,
        };
        assert_eq!(report.exit_code(0.05), ExitCode::Success);
    }
}
