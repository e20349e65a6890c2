//! Tiered submission of generated documents.
//!
//! Documents are applied tier by tier ([`Tier::ALL`]): appliances and
//! VNETs, then mappings, QoS and ENIs, then routes. Between tiers the
//! orchestrator either polls the device until the previous tier's tables
//! are populated or, without a probe, sleeps a fixed settle delay.
//!
//! The first rejected submission stops the run. Nothing is retried or
//! rolled back; the [`RunReport`] records every call made up to that point.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};

use crate::assembler::WrittenDocument;
use crate::error::DashPerfError;
use crate::readiness::{wait_for_drain, wait_for_entries, BackoffPolicy, ReadinessProbe};
use crate::submit::{ConfigSubmitter, SubmitStatus};
use crate::tables::{delete_path, update_path, DashTable, Tier};

/// Maximum delete paths per set request during teardown.
pub const DELETE_CHUNK_SIZE: usize = 500;

/// How the orchestrator waits between dependency tiers.
#[derive(Clone)]
pub enum SettleStrategy {
    /// Sleep a fixed time between tiers.
    FixedDelay(Duration),
    /// Poll each table of the finished tier, including the last one.
    Poll {
        probe: Arc<dyn ReadinessProbe>,
        policy: BackoffPolicy,
    },
}

impl fmt::Debug for SettleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettleStrategy::FixedDelay(delay) => {
                f.debug_tuple("FixedDelay").field(delay).finish()
            }
            SettleStrategy::Poll { policy, .. } => {
                f.debug_struct("Poll").field("policy", policy).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Delete,
}

/// One set request and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub operation: Operation,
    pub tier: Tier,
    pub table: DashTable,
    pub document: PathBuf,
    pub paths: usize,
    pub status: SubmitStatus,
    pub elapsed: Duration,
}

/// One wait between (or after) tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitRecord {
    pub tier: Tier,
    /// `None` for a fixed settle delay covering the whole tier.
    pub table: Option<DashTable>,
    pub expected: usize,
    pub waited: Duration,
}

/// Everything issued during one apply or teardown run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub scenario: String,
    pub submissions: Vec<SubmissionRecord>,
    pub waits: Vec<WaitRecord>,
    pub elapsed: Duration,
    /// The error that stopped the run, if any.
    pub failure: Option<DashPerfError>,
    /// Tier being applied or removed when the run stopped.
    pub stopped_in: Option<Tier>,
}

impl RunReport {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn stop(&mut self, tier: Tier, error: DashPerfError) {
        self.stopped_in = Some(tier);
        self.failure = Some(error);
    }

    /// The tier in which the run stopped.
    pub fn failed_tier(&self) -> Option<Tier> {
        let failure = self.failure.as_ref()?;
        failure.failed_tier().or(self.stopped_in)
    }

    /// Tiers with at least one submission, in the order they were applied.
    pub fn tiers_attempted(&self) -> Vec<Tier> {
        let mut tiers: Vec<Tier> = Vec::new();
        for record in &self.submissions {
            if tiers.last() != Some(&record.tier) {
                tiers.push(record.tier);
            }
        }
        tiers
    }

    /// Total time spent inside set requests.
    pub fn submit_time(&self) -> Duration {
        self.submissions.iter().map(|s| s.elapsed).sum()
    }

    /// Converts a failed report into its error.
    pub fn into_result(mut self) -> Result<RunReport, DashPerfError> {
        match self.failure.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.scenario)?;
        for s in &self.submissions {
            writeln!(
                f,
                "  [{}] {:?} {} {} ({} paths): status {} in {:?}",
                s.tier,
                s.operation,
                s.table,
                s.document.display(),
                s.paths,
                s.status.code,
                s.elapsed
            )?;
        }
        for w in &self.waits {
            match w.table {
                Some(table) => writeln!(
                    f,
                    "  [{}] {} reached {} entries after {:?}",
                    w.tier, table, w.expected, w.waited
                )?,
                None => writeln!(f, "  [{}] settled for {:?}", w.tier, w.waited)?,
            }
        }
        match (&self.failure, self.failed_tier()) {
            (Some(e), Some(tier)) => {
                write!(f, "FAILED in {} tier after {:?}: {}", tier, self.elapsed, e)
            }
            (Some(e), None) => write!(f, "FAILED after {:?}: {}", self.elapsed, e),
            (None, _) => write!(
                f,
                "OK in {:?}, {:?} in set requests",
                self.elapsed,
                self.submit_time()
            ),
        }
    }
}

/// Groups documents by tier, keeping their relative order.
fn by_tier(docs: &[WrittenDocument]) -> BTreeMap<Tier, Vec<&WrittenDocument>> {
    let mut tiers: BTreeMap<Tier, Vec<&WrittenDocument>> = BTreeMap::new();
    for doc in docs {
        tiers.entry(doc.table.tier()).or_default().push(doc);
    }
    tiers
}

/// Expected entry count per table of one tier.
fn table_counts(docs: &[&WrittenDocument]) -> BTreeMap<DashTable, usize> {
    let mut counts = BTreeMap::new();
    for doc in docs {
        *counts.entry(doc.table).or_insert(0) += doc.entry_count();
    }
    counts
}

/// Applies documents through a [`ConfigSubmitter`] in dependency order.
pub struct Orchestrator<S> {
    submitter: S,
    settle: SettleStrategy,
}

impl<S: ConfigSubmitter> Orchestrator<S> {
    pub fn new(submitter: S, settle: SettleStrategy) -> Self {
        Self { submitter, settle }
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Submits every document, one set request each, tier by tier.
    pub async fn apply(&self, scenario: &str, docs: &[WrittenDocument]) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(scenario);
        let tiers = by_tier(docs);
        let last_tier = tiers.keys().next_back().copied();

        info!(scenario, documents = docs.len(), "Applying scenario");

        for (tier, tier_docs) in &tiers {
            info!(tier = %tier, documents = tier_docs.len(), "Applying tier");
            for doc in tier_docs {
                let path = update_path(doc.table, &doc.path.to_string_lossy());
                if !self
                    .submit(Operation::Update, *tier, doc, vec![path], &mut report)
                    .await
                {
                    return self.finish(report, start);
                }
            }

            let counts = table_counts(tier_docs);
            let more_tiers = Some(*tier) != last_tier;
            let settled = self
                .settle_after(*tier, &counts, more_tiers, false, &mut report)
                .await;
            if let Err(e) = settled {
                report.stop(*tier, e);
                return self.finish(report, start);
            }
        }

        self.finish(report, start)
    }

    /// Deletes every entry of `docs`, routes first, in chunks of
    /// [`DELETE_CHUNK_SIZE`] keys per set request.
    pub async fn teardown(&self, scenario: &str, docs: &[WrittenDocument]) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::new(scenario);
        let tiers = by_tier(docs);
        let last_tier = tiers.keys().next().copied();

        info!(scenario, documents = docs.len(), "Tearing down scenario");

        for (tier, tier_docs) in tiers.iter().rev() {
            info!(tier = %tier, documents = tier_docs.len(), "Removing tier");
            for doc in tier_docs {
                for chunk in doc.keys.chunks(DELETE_CHUNK_SIZE) {
                    let paths = chunk.iter().map(|key| delete_path(doc.table, key)).collect();
                    if !self
                        .submit(Operation::Delete, *tier, doc, paths, &mut report)
                        .await
                    {
                        return self.finish(report, start);
                    }
                }
            }

            let counts = table_counts(tier_docs);
            let more_tiers = Some(*tier) != last_tier;
            let settled = self
                .settle_after(*tier, &counts, more_tiers, true, &mut report)
                .await;
            if let Err(e) = settled {
                report.stop(*tier, e);
                return self.finish(report, start);
            }
        }

        self.finish(report, start)
    }

    /// Issues one set request and records it. Returns false if the run
    /// must stop.
    async fn submit(
        &self,
        operation: Operation,
        tier: Tier,
        doc: &WrittenDocument,
        paths: Vec<String>,
        report: &mut RunReport,
    ) -> bool {
        let call_start = Instant::now();
        let result = match operation {
            Operation::Update => self.submitter.submit(&paths, &[]).await,
            Operation::Delete => self.submitter.submit(&[], &paths).await,
        };
        let elapsed = call_start.elapsed();

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                error!(
                    tier = %tier,
                    table = %doc.table,
                    error = %e,
                    "Submission could not be issued"
                );
                report.stop(tier, e);
                return false;
            }
        };

        info!(
            tier = %tier,
            table = %doc.table,
            document = %doc.path.display(),
            entries = doc.entry_count(),
            code = status.code,
            elapsed_ms = elapsed.as_millis() as u64,
            "Submitted {:?}",
            operation
        );

        let failed = !status.is_success();
        if failed {
            error!(
                table = %doc.table,
                code = status.code,
                message = %status.message,
                "Submission rejected"
            );
            report.stop(
                tier,
                DashPerfError::SubmissionFailed {
                    tier,
                    table: doc.table,
                    code: status.code,
                    message: status.message.clone(),
                },
            );
        }

        report.submissions.push(SubmissionRecord {
            operation,
            tier,
            table: doc.table,
            document: doc.path.clone(),
            paths: paths.len(),
            status,
            elapsed,
        });
        !failed
    }

    async fn settle_after(
        &self,
        tier: Tier,
        counts: &BTreeMap<DashTable, usize>,
        more_tiers: bool,
        draining: bool,
        report: &mut RunReport,
    ) -> Result<(), DashPerfError> {
        match &self.settle {
            SettleStrategy::FixedDelay(delay) => {
                if more_tiers && !delay.is_zero() {
                    info!(tier = %tier, ?delay, "Waiting settle delay");
                    tokio::time::sleep(*delay).await;
                    report.waits.push(WaitRecord {
                        tier,
                        table: None,
                        expected: 0,
                        waited: *delay,
                    });
                }
            }
            SettleStrategy::Poll { probe, policy } => {
                for (table, expected) in counts {
                    let (expected, waited) = if draining {
                        (0, wait_for_drain(probe.as_ref(), *table, policy).await?)
                    } else {
                        let waited =
                            wait_for_entries(probe.as_ref(), *table, *expected, policy).await?;
                        (*expected, waited)
                    };
                    report.waits.push(WaitRecord {
                        tier,
                        table: Some(*table),
                        expected,
                        waited,
                    });
                }
            }
        }
        Ok(())
    }

    fn finish(&self, mut report: RunReport, start: Instant) -> RunReport {
        report.elapsed = start.elapsed();
        match &report.failure {
            Some(e) => error!(
                scenario = %report.scenario,
                submissions = report.submissions.len(),
                error = %e,
                "Run failed"
            ),
            None => info!(
                scenario = %report.scenario,
                submissions = report.submissions.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Run complete"
            ),
        }
        report
    }
}
