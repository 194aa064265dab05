//! Repository abstraction. The pipeline only ever upserts and reads; nothing
//! here deletes. Implementations compare fields and skip the write when an
//! upsert would change nothing, reporting what actually happened.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    EarningRecord, Player, ReferenceEntry, ResultEntry, RosterSlot, ScheduledEvent, Team,
    Tournament, Transfer,
};

pub use memory::MemoryRepository;

/// What an upsert did. `Unchanged` means an identical record already existed
/// and no write happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    pub fn wrote(self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Running totals of upsert outcomes for one stage or one ingest run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertTally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertTally {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn writes(&self) -> usize {
        self.created + self.updated
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    pub fn merge(&mut self, other: &UpsertTally) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

impl std::fmt::Display for UpsertTally {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} unchanged={}",
            self.created, self.updated, self.unchanged
        )
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    // players
    async fn player(&self, id: Uuid) -> Result<Option<Player>>;
    async fn player_by_account_id(&self, account_id: &str) -> Result<Option<Player>>;
    async fn player_by_wiki_url(&self, wiki_url: &str) -> Result<Option<Player>>;
    /// Current or historical IGN, case-insensitive.
    async fn player_by_ign(&self, ign: &str) -> Result<Option<Player>>;
    async fn players(&self) -> Result<Vec<Player>>;
    async fn upsert_player(&self, player: &Player) -> Result<UpsertOutcome>;

    // tournaments
    async fn tournament(&self, slug: &str) -> Result<Option<Tournament>>;
    async fn upsert_tournament(&self, tournament: &Tournament) -> Result<UpsertOutcome>;

    // teams and rosters
    async fn team(&self, slug: &str) -> Result<Option<Team>>;
    async fn upsert_team(&self, team: &Team) -> Result<UpsertOutcome>;
    async fn roster_slots(&self) -> Result<Vec<RosterSlot>>;
    async fn upsert_roster_slot(&self, slot: &RosterSlot) -> Result<UpsertOutcome>;

    // transfers
    async fn transfers(&self) -> Result<Vec<Transfer>>;
    async fn upsert_transfer(&self, transfer: &Transfer) -> Result<UpsertOutcome>;

    // earnings, unique per (player, tournament key)
    async fn earning(&self, player_id: Uuid, tournament_id: &str)
        -> Result<Option<EarningRecord>>;
    async fn upsert_earning(
        &self,
        player_id: Uuid,
        record: &EarningRecord,
    ) -> Result<UpsertOutcome>;

    // platform-side leaderboard rows
    /// Entries whose display name case-insensitively equals any of `names`.
    async fn result_entries_matching_names(&self, names: &[String]) -> Result<Vec<ResultEntry>>;
    async fn upsert_result_entry(&self, entry: &ResultEntry) -> Result<UpsertOutcome>;

    // schedule and reference data
    async fn upsert_scheduled_event(&self, event: &ScheduledEvent) -> Result<UpsertOutcome>;
    async fn upsert_reference_entry(&self, entry: &ReferenceEntry) -> Result<UpsertOutcome>;
}
