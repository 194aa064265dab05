//! Sync run plumbing: the fixed stage list, per-stage execution state, and
//! the run report handed to the notifier.

pub mod orchestrator;
pub mod stages;

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use indexmap::IndexMap;

use crate::model::SkipReasonCounters;
use crate::repo::UpsertTally;

pub use orchestrator::SyncOrchestrator;

/// The stages of one full sync, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    Tournaments,
    Teams,
    Players,
    ReferenceData,
    Transfers,
    Schedule,
    Earnings,
}

impl SyncStage {
    pub const ALL: [SyncStage; 7] = [
        SyncStage::Tournaments,
        SyncStage::Teams,
        SyncStage::Players,
        SyncStage::ReferenceData,
        SyncStage::Transfers,
        SyncStage::Schedule,
        SyncStage::Earnings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStage::Tournaments => "tournaments",
            SyncStage::Teams => "teams",
            SyncStage::Players => "players",
            SyncStage::ReferenceData => "reference-data",
            SyncStage::Transfers => "transfers",
            SyncStage::Schedule => "schedule",
            SyncStage::Earnings => "earnings",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("unknown sync stage {s:?}"))
    }
}

/// Execution token for one stage. `Running` refuses overlapping triggers;
/// `Failed` records the last outcome but never blocks a rerun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageState {
    #[default]
    Idle,
    Running,
    Failed,
}

/// Stage tokens for one orchestrator instance. Held behind a plain mutex;
/// no lock is ever kept across an await.
#[derive(Debug, Default)]
pub struct StageStates {
    states: Mutex<HashMap<SyncStage, StageState>>,
}

impl StageStates {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SyncStage, StageState>> {
        match self.states.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self, stage: SyncStage) -> StageState {
        self.lock().get(&stage).copied().unwrap_or_default()
    }

    /// Move `stage` to `Running` unless it already is; returns whether the
    /// caller won the token.
    pub fn try_begin(&self, stage: SyncStage) -> bool {
        let mut states = self.lock();
        match states.get(&stage).copied().unwrap_or_default() {
            StageState::Running => false,
            StageState::Idle | StageState::Failed => {
                states.insert(stage, StageState::Running);
                true
            }
        }
    }

    pub fn finish(&self, stage: SyncStage, failed: bool) {
        let state = if failed {
            StageState::Failed
        } else {
            StageState::Idle
        };
        self.lock().insert(stage, state);
    }
}

/// What one successful stage did: write tally, per-reason skips (earnings
/// only), pages or payloads visited, and visits that failed without
/// failing the stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageSummary {
    pub tally: UpsertTally,
    pub skipped: SkipReasonCounters,
    pub visited: usize,
    pub failed_visits: usize,
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} visited={}", self.tally, self.visited)?;
        if self.failed_visits > 0 {
            write!(f, " failed_visits={}", self.failed_visits)?;
        }
        if self.skipped.total() > 0 {
            write!(f, " skipped[{}]", self.skipped)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success(StageSummary),
    Error(String),
    Skipped(String),
}

/// Per-stage outcomes of one run, in stage order, plus the wall-clock time
/// the run took.
#[derive(Debug, Default)]
pub struct SyncRunReport {
    pub stages: IndexMap<SyncStage, StageOutcome>,
    pub elapsed: Duration,
}

impl SyncRunReport {
    pub fn success_count(&self) -> usize {
        self.stages
            .values()
            .filter(|o| matches!(o, StageOutcome::Success(_)))
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn errors(&self) -> impl Iterator<Item = (SyncStage, &str)> {
        self.stages.iter().filter_map(|(stage, outcome)| match outcome {
            StageOutcome::Error(message) => Some((*stage, message.as_str())),
            _ => None,
        })
    }

    /// Plain-text summary for the notifier: one line per stage in run
    /// order, then the error tail when anything failed.
    pub fn render(&self) -> String {
        let mut out = format!(
            "sync run finished in {:.1}s: {} succeeded, {} failed\n",
            self.elapsed.as_secs_f64(),
            self.success_count(),
            self.error_count(),
        );
        for (stage, outcome) in &self.stages {
            let _ = match outcome {
                StageOutcome::Success(summary) => writeln!(out, "  {stage}: {summary}"),
                StageOutcome::Error(message) => writeln!(out, "  {stage}: error: {message}"),
                StageOutcome::Skipped(reason) => writeln!(out, "  {stage}: skipped ({reason})"),
            };
        }
        out.truncate(out.trim_end().len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::UpsertOutcome;

    #[test]
    fn stage_names_round_trip() {
        for stage in SyncStage::ALL {
            assert_eq!(stage.as_str().parse::<SyncStage>().unwrap(), stage);
        }
        assert_eq!(
            " Reference-Data ".parse::<SyncStage>().unwrap(),
            SyncStage::ReferenceData
        );
        assert!("standings".parse::<SyncStage>().is_err());
    }

    #[test]
    fn running_stage_refuses_a_second_trigger() {
        let states = StageStates::default();
        assert!(states.try_begin(SyncStage::Earnings));
        assert_eq!(states.state(SyncStage::Earnings), StageState::Running);
        assert!(!states.try_begin(SyncStage::Earnings));
        // other stages are unaffected
        assert!(states.try_begin(SyncStage::Schedule));

        states.finish(SyncStage::Earnings, true);
        assert_eq!(states.state(SyncStage::Earnings), StageState::Failed);
        // a failed stage may run again
        assert!(states.try_begin(SyncStage::Earnings));
        states.finish(SyncStage::Earnings, false);
        assert_eq!(states.state(SyncStage::Earnings), StageState::Idle);
    }

    #[test]
    fn report_counts_and_rendering() {
        let mut report = SyncRunReport::default();
        let mut summary = StageSummary::default();
        summary.tally.record(UpsertOutcome::Created);
        summary.visited = 3;
        report
            .stages
            .insert(SyncStage::Tournaments, StageOutcome::Success(summary));
        report.stages.insert(
            SyncStage::Teams,
            StageOutcome::Error("wiki unreachable".into()),
        );
        report
            .stages
            .insert(SyncStage::Schedule, StageOutcome::Skipped("excluded by flag".into()));
        report.elapsed = Duration::from_millis(2500);

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.error_count(), 1);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors, vec![(SyncStage::Teams, "wiki unreachable")]);

        let text = report.render();
        assert!(text.starts_with("sync run finished in 2.5s: 1 succeeded, 1 failed"));
        assert!(text.contains("tournaments: created=1"));
        assert!(text.contains("teams: error: wiki unreachable"));
        assert!(text.contains("schedule: skipped (excluded by flag)"));
    }
}
