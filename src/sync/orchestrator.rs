//! Drives full sync runs: stages in fixed order, one catch boundary per
//! stage, fixed delays between requests, and the run report handed to the
//! notifier at the end. There is no retry; a failed stage is recorded and
//! the run moves on.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::fetch::PageFetcher;
use crate::identity::{IdentityResolver, ReconcileSummary};
use crate::notify::Notifier;
use crate::repo::Repository;
use crate::sync::{stages, StageOutcome, StageStates, StageSummary, SyncRunReport, SyncStage};

pub struct SyncOrchestrator {
    pub(crate) repo: Arc<dyn Repository>,
    pub(crate) fetcher: Arc<dyn PageFetcher>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: SyncConfig,
    pub(crate) states: StageStates,
}

impl SyncOrchestrator {
    pub fn new(
        repo: Arc<dyn Repository>,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
            config,
            states: StageStates::default(),
        }
    }

    /// Run every stage in order, skipping the ones named in `skip`. Every
    /// stage is attempted regardless of earlier failures; the report goes to
    /// the notifier before it is returned.
    pub async fn run(&self, skip: &[SyncStage]) -> SyncRunReport {
        let started = Instant::now();
        let mut report = SyncRunReport::default();
        for stage in SyncStage::ALL {
            if skip.contains(&stage) {
                info!(stage = %stage, "stage excluded by flag");
                report
                    .stages
                    .insert(stage, StageOutcome::Skipped("excluded by flag".into()));
                continue;
            }
            report.stages.insert(stage, self.run_stage(stage).await);
        }
        report.elapsed = started.elapsed();

        info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            succeeded = report.success_count(),
            failed = report.error_count(),
            "sync run finished"
        );
        if let Err(err) = self.notifier.notify(&report.render()).await {
            warn!(error = %err, "run report notification failed");
        }
        report
    }

    /// Run one stage behind its state token. A stage already `Running` (a
    /// concurrent trigger on a shared orchestrator) is skipped, not queued.
    pub async fn run_stage(&self, stage: SyncStage) -> StageOutcome {
        if !self.states.try_begin(stage) {
            warn!(stage = %stage, "stage already running, trigger dropped");
            return StageOutcome::Skipped("already running".into());
        }
        info!(stage = %stage, "stage starting");
        let started = Instant::now();
        let result = self.dispatch(stage).await;
        self.states.finish(stage, result.is_err());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(summary) => {
                info!(stage = %stage, elapsed_ms, summary = %summary, "stage finished");
                StageOutcome::Success(summary)
            }
            Err(err) => {
                warn!(stage = %stage, elapsed_ms, error = %err, "stage failed");
                StageOutcome::Error(format!("{err:#}"))
            }
        }
    }

    async fn dispatch(&self, stage: SyncStage) -> Result<StageSummary> {
        match stage {
            SyncStage::Tournaments => stages::sync_tournaments(self).await,
            SyncStage::Teams => stages::sync_teams(self).await,
            SyncStage::Players => stages::sync_players(self).await,
            SyncStage::ReferenceData => stages::sync_reference_data(self).await,
            SyncStage::Transfers => stages::sync_transfers(self).await,
            SyncStage::Schedule => stages::sync_schedule(self).await,
            SyncStage::Earnings => stages::sync_earnings(self).await,
        }
    }

    /// Account-id reconciliation over all players. Separate from the seven
    /// stages; run it after a sync once fresh leaderboard entries landed.
    pub async fn reconcile_identities(&self) -> Result<ReconcileSummary> {
        IdentityResolver::new(self.repo.as_ref())
            .reconcile_all()
            .await
    }

    /// Fixed inter-request delay within a stage.
    pub(crate) async fn throttle(&self) {
        tokio::time::sleep(self.config.request_delay()).await;
    }
}
