//! In-memory repository. Backs tests and dry runs with the same upsert
//! semantics a durable store would have.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    EarningRecord, Player, ReferenceEntry, ResultEntry, RosterSlot, ScheduledEvent, Team,
    Tournament, Transfer,
};

use super::{Repository, UpsertOutcome};

#[derive(Default)]
struct Inner {
    players: HashMap<Uuid, Player>,
    tournaments: HashMap<String, Tournament>,
    teams: HashMap<String, Team>,
    roster: HashMap<(String, String), RosterSlot>,
    transfers: HashMap<String, Transfer>,
    earnings: HashMap<(Uuid, String), EarningRecord>,
    results: HashMap<(String, String), ResultEntry>,
    schedule: HashMap<(String, String), ScheduledEvent>,
    reference: HashMap<(String, String), ReferenceEntry>,
}

#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("repository lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| anyhow!("repository lock poisoned"))
    }
}

/// Write-if-different. The comparison against the stored record is what makes
/// repeated syncs idempotent.
fn upsert<K, V>(map: &mut HashMap<K, V>, key: K, value: &V) -> UpsertOutcome
where
    K: Eq + Hash,
    V: Clone + PartialEq,
{
    match map.get(&key) {
        Some(existing) if existing == value => UpsertOutcome::Unchanged,
        Some(_) => {
            map.insert(key, value.clone());
            UpsertOutcome::Updated
        }
        None => {
            map.insert(key, value.clone());
            UpsertOutcome::Created
        }
    }
}

fn roster_key(slot: &RosterSlot) -> (String, String) {
    (slot.team_slug.clone(), slot.player_ign.to_lowercase())
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn player(&self, id: Uuid) -> Result<Option<Player>> {
        Ok(self.read()?.players.get(&id).cloned())
    }

    async fn player_by_account_id(&self, account_id: &str) -> Result<Option<Player>> {
        Ok(self
            .read()?
            .players
            .values()
            .find(|p| p.epic_account_id.as_deref() == Some(account_id))
            .cloned())
    }

    async fn player_by_wiki_url(&self, wiki_url: &str) -> Result<Option<Player>> {
        Ok(self
            .read()?
            .players
            .values()
            .find(|p| p.wiki_url.as_deref() == Some(wiki_url))
            .cloned())
    }

    async fn player_by_ign(&self, ign: &str) -> Result<Option<Player>> {
        Ok(self
            .read()?
            .players
            .values()
            .find(|p| p.uses_ign(ign))
            .cloned())
    }

    async fn players(&self) -> Result<Vec<Player>> {
        Ok(self.read()?.players.values().cloned().collect())
    }

    async fn upsert_player(&self, player: &Player) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.players,
            player.player_id,
            player,
        ))
    }

    async fn tournament(&self, slug: &str) -> Result<Option<Tournament>> {
        Ok(self.read()?.tournaments.get(slug).cloned())
    }

    async fn upsert_tournament(&self, tournament: &Tournament) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.tournaments,
            tournament.slug.clone(),
            tournament,
        ))
    }

    async fn team(&self, slug: &str) -> Result<Option<Team>> {
        Ok(self.read()?.teams.get(slug).cloned())
    }

    async fn upsert_team(&self, team: &Team) -> Result<UpsertOutcome> {
        Ok(upsert(&mut self.write()?.teams, team.slug.clone(), team))
    }

    async fn roster_slots(&self) -> Result<Vec<RosterSlot>> {
        Ok(self.read()?.roster.values().cloned().collect())
    }

    async fn upsert_roster_slot(&self, slot: &RosterSlot) -> Result<UpsertOutcome> {
        Ok(upsert(&mut self.write()?.roster, roster_key(slot), slot))
    }

    async fn transfers(&self) -> Result<Vec<Transfer>> {
        Ok(self.read()?.transfers.values().cloned().collect())
    }

    async fn upsert_transfer(&self, transfer: &Transfer) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.transfers,
            transfer.slug.clone(),
            transfer,
        ))
    }

    async fn earning(
        &self,
        player_id: Uuid,
        tournament_id: &str,
    ) -> Result<Option<EarningRecord>> {
        Ok(self
            .read()?
            .earnings
            .get(&(player_id, tournament_id.to_string()))
            .cloned())
    }

    async fn upsert_earning(
        &self,
        player_id: Uuid,
        record: &EarningRecord,
    ) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.earnings,
            (player_id, record.tournament_id.clone()),
            record,
        ))
    }

    async fn result_entries_matching_names(&self, names: &[String]) -> Result<Vec<ResultEntry>> {
        Ok(self
            .read()?
            .results
            .values()
            .filter(|entry| {
                names
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(&entry.display_name))
            })
            .cloned()
            .collect())
    }

    async fn upsert_result_entry(&self, entry: &ResultEntry) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.results,
            (entry.event_id.clone(), entry.account_id.clone()),
            entry,
        ))
    }

    async fn upsert_scheduled_event(&self, event: &ScheduledEvent) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.schedule,
            (event.event_id.clone(), event.window_id.clone()),
            event,
        ))
    }

    async fn upsert_reference_entry(&self, entry: &ReferenceEntry) -> Result<UpsertOutcome> {
        Ok(upsert(
            &mut self.write()?.reference,
            (entry.kind.clone(), entry.key.clone()),
            entry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tournament(slug: &str, name: &str) -> Tournament {
        Tournament {
            slug: slug.to_string(),
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2023, 5, 14).unwrap(),
            tier: None,
            prize_pool: None,
        }
    }

    #[tokio::test]
    async fn upsert_reports_created_unchanged_updated() {
        let repo = MemoryRepository::new();
        let t = tournament("2023-05-14-fncs", "FNCS");
        assert_eq!(
            repo.upsert_tournament(&t).await.unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            repo.upsert_tournament(&t).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        let mut renamed = t.clone();
        renamed.name = "FNCS Grand Finals".into();
        assert_eq!(
            repo.upsert_tournament(&renamed).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(
            repo.tournament("2023-05-14-fncs").await.unwrap().unwrap().name,
            "FNCS Grand Finals"
        );
    }

    #[tokio::test]
    async fn player_lookup_covers_historical_igns() {
        let repo = MemoryRepository::new();
        let mut player = Player::new("Current", None);
        player.ign_history.push(crate::model::IgnRecord {
            ign: "OldName".into(),
            used_from: chrono::Utc::now(),
            used_until: Some(chrono::Utc::now()),
        });
        repo.upsert_player(&player).await.unwrap();

        let by_old = repo.player_by_ign("oldname").await.unwrap();
        assert_eq!(by_old.map(|p| p.player_id), Some(player.player_id));
        assert!(repo.player_by_ign("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn result_entries_match_names_case_insensitively() {
        let repo = MemoryRepository::new();
        let entry = ResultEntry {
            account_id: "a".repeat(32),
            display_name: "Mongraal".into(),
            event_id: "epic_s13".into(),
            rank: 1,
            points: 75,
        };
        repo.upsert_result_entry(&entry).await.unwrap();

        let hits = repo
            .result_entries_matching_names(&["MONGRAAL".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(repo
            .result_entries_matching_names(&["other".to_string()])
            .await
            .unwrap()
            .is_empty());
    }
}
