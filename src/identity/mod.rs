//! Cross-source player identity: connects wiki-side players (IGNs, page
//! URLs) to platform-side account ids found in leaderboard result entries.
//! Works against the repository only; it never scrapes.

use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{IgnRecord, Player};
use crate::repo::Repository;

/// Supporting result rows needed for a confident match. Discovery still
/// accepts a single row, with a low-confidence warning.
pub const CONFIDENT_MATCH_FLOOR: usize = 2;

/// True for well-formed platform account ids: exactly 32 lowercase hex chars.
pub fn is_account_id(value: &str) -> bool {
    value.len() == 32
        && value
            .chars()
            .all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}

/// Placeholder ids minted by earlier import passes; never real accounts.
fn is_synthetic_account_id(value: &str) -> bool {
    value.starts_with("wiki-") || value.starts_with("player_")
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub linked: usize,
    pub conflicts: usize,
    pub unmatched: usize,
    pub already_linked: usize,
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "linked={} conflicts={} unmatched={} already_linked={}",
            self.linked, self.conflicts, self.unmatched, self.already_linked
        )
    }
}

pub struct IdentityResolver<'a> {
    repo: &'a dyn Repository,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Find the platform account id for a player from leaderboard rows whose
    /// display name matches any IGN the player has ever used. Returns the
    /// already-linked id unchanged when one is set.
    #[instrument(skip(self))]
    pub async fn discover_account_id(&self, player_id: Uuid) -> Result<Option<String>> {
        let Some(player) = self.repo.player(player_id).await? else {
            return Ok(None);
        };
        if let Some(existing) = player.epic_account_id.as_ref() {
            return Ok(Some(existing.clone()));
        }

        let names: Vec<String> = player.known_igns().iter().map(|s| s.to_string()).collect();
        let entries = self.repo.result_entries_matching_names(&names).await?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &entries {
            let candidate = entry.account_id.as_str();
            if is_synthetic_account_id(candidate) || !is_account_id(candidate) {
                continue;
            }
            *counts.entry(candidate).or_default() += 1;
        }

        // highest support wins; ties break to the smaller id so reruns agree
        let best = counts
            .into_iter()
            .max_by(|(id_a, n_a), (id_b, n_b)| n_a.cmp(n_b).then_with(|| id_b.cmp(id_a)));
        let Some((account_id, count)) = best else {
            debug!(player = %player.current_ign, "no account candidates");
            return Ok(None);
        };

        if count < CONFIDENT_MATCH_FLOOR {
            warn!(
                player = %player.current_ign,
                account_id = %account_id,
                matches = count,
                "accepting low-confidence account match"
            );
        } else {
            debug!(
                player = %player.current_ign,
                account_id = %account_id,
                matches = count,
                "account match"
            );
        }
        Ok(Some(account_id.to_string()))
    }

    /// Attach an account id to a player. Returns false when the id already
    /// belongs to a different player; re-linking the same pair succeeds. On
    /// success the id is copied onto roster and transfer records that
    /// reference the player.
    #[instrument(skip(self))]
    pub async fn link_account_id(&self, player_id: Uuid, account_id: &str) -> Result<bool> {
        if let Some(holder) = self.repo.player_by_account_id(account_id).await? {
            if holder.player_id != player_id {
                warn!(
                    account_id = %account_id,
                    holder = %holder.current_ign,
                    "account id already linked to another player"
                );
                return Ok(false);
            }
        }
        let Some(mut player) = self.repo.player(player_id).await? else {
            warn!(%player_id, "link requested for unknown player");
            return Ok(false);
        };

        player.epic_account_id = Some(account_id.to_string());
        self.repo.upsert_player(&player).await?;
        let propagated = self.propagate_account_id(&player, account_id).await?;
        info!(
            player = %player.current_ign,
            account_id = %account_id,
            propagated,
            "account id linked"
        );
        Ok(true)
    }

    /// Copy the account id onto denormalized roster/transfer rows. Rows with
    /// a matching player id, or an unresolved row matching a known IGN, get
    /// the id (and the player id, when missing).
    async fn propagate_account_id(&self, player: &Player, account_id: &str) -> Result<usize> {
        let mut touched = 0;

        for mut slot in self.repo.roster_slots().await? {
            if !references_player(slot.player_id, &slot.player_ign, player)
                || slot.epic_account_id.as_deref() == Some(account_id)
            {
                continue;
            }
            slot.epic_account_id = Some(account_id.to_string());
            slot.player_id.get_or_insert(player.player_id);
            self.repo.upsert_roster_slot(&slot).await?;
            touched += 1;
        }

        for mut transfer in self.repo.transfers().await? {
            if !references_player(transfer.player_id, &transfer.player_ign, player)
                || transfer.epic_account_id.as_deref() == Some(account_id)
            {
                continue;
            }
            transfer.epic_account_id = Some(account_id.to_string());
            transfer.player_id.get_or_insert(player.player_id);
            self.repo.upsert_transfer(&transfer).await?;
            touched += 1;
        }

        Ok(touched)
    }

    /// Resolve a free-form identifier to a player. Interpretations are tried
    /// in a fixed order: platform account id, then player UUID, then wiki
    /// URL, then current-or-historical IGN. The account-id check runs before
    /// the UUID parse because every 32-hex id is also a parseable UUID.
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Player>> {
        let identifier = identifier.trim();

        if is_account_id(identifier) {
            if let Some(player) = self.repo.player_by_account_id(identifier).await? {
                return Ok(Some(player));
            }
        }
        if let Ok(uuid) = Uuid::parse_str(identifier) {
            if let Some(player) = self.repo.player(uuid).await? {
                return Ok(Some(player));
            }
        }
        if identifier.contains('/') {
            if let Some(player) = self.repo.player_by_wiki_url(identifier).await? {
                return Ok(Some(player));
            }
        }
        self.repo.player_by_ign(identifier).await
    }

    /// Record an IGN change. Case-insensitive equality with the current IGN
    /// is a no-op; otherwise the open history span is closed, a new open span
    /// starts now, and the current IGN moves. Returns whether anything moved.
    #[instrument(skip(self))]
    pub async fn update_ign(&self, player_id: Uuid, new_ign: &str) -> Result<bool> {
        let new_ign = new_ign.trim();
        let Some(mut player) = self.repo.player(player_id).await? else {
            warn!(%player_id, "ign update for unknown player");
            return Ok(false);
        };
        if player.current_ign.eq_ignore_ascii_case(new_ign) {
            return Ok(false);
        }

        let now = Utc::now();
        for record in &mut player.ign_history {
            if record.used_until.is_none() {
                record.used_until = Some(now);
            }
        }
        player.ign_history.push(IgnRecord {
            ign: new_ign.to_string(),
            used_from: now,
            used_until: None,
        });
        let old_ign = std::mem::replace(&mut player.current_ign, new_ign.to_string());
        self.repo.upsert_player(&player).await?;
        info!(player_id = %player_id, from = %old_ign, to = %new_ign, "ign rotated");
        Ok(true)
    }

    /// Reconciliation pass: discovery plus linking for every player that has
    /// no account id yet.
    pub async fn reconcile_all(&self) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        for player in self.repo.players().await? {
            if player.epic_account_id.is_some() {
                summary.already_linked += 1;
                continue;
            }
            match self.discover_account_id(player.player_id).await? {
                Some(account_id) => {
                    if self.link_account_id(player.player_id, &account_id).await? {
                        summary.linked += 1;
                    } else {
                        summary.conflicts += 1;
                    }
                }
                None => summary.unmatched += 1,
            }
        }
        info!(%summary, "identity reconciliation finished");
        Ok(summary)
    }
}

fn references_player(linked: Option<Uuid>, ign: &str, player: &Player) -> bool {
    match linked {
        Some(id) => id == player.player_id,
        None => player.uses_ign(ign),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResultEntry, RosterSlot, Transfer};
    use crate::repo::MemoryRepository;
    use chrono::NaiveDate;

    fn hex_id(fill: char) -> String {
        std::iter::repeat(fill).take(32).collect()
    }

    async fn seed_player(repo: &MemoryRepository, ign: &str) -> Player {
        let player = Player::new(ign, Some(format!("https://liquipedia.net/fortnite/{ign}")));
        repo.upsert_player(&player).await.unwrap();
        player
    }

    async fn seed_entry(repo: &MemoryRepository, account_id: &str, name: &str, event: &str) {
        repo.upsert_result_entry(&ResultEntry {
            account_id: account_id.to_string(),
            display_name: name.to_string(),
            event_id: event.to_string(),
            rank: 10,
            points: 40,
        })
        .await
        .unwrap();
    }

    #[test]
    fn account_id_shape_is_strict() {
        assert!(is_account_id(&hex_id('a')));
        assert!(!is_account_id(&hex_id('a')[..31]));
        assert!(!is_account_id(&format!("{}x", &hex_id('a')[..31])));
        assert!(!is_account_id(&hex_id('A')));
        assert!(!is_account_id("wiki-0000"));
    }

    #[tokio::test]
    async fn discovery_picks_the_best_supported_candidate() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "Mongraal").await;

        seed_entry(&repo, &hex_id('a'), "Mongraal", "s13-week1").await;
        seed_entry(&repo, &hex_id('a'), "mongraal", "s13-week2").await;
        seed_entry(&repo, &hex_id('b'), "Mongraal", "s13-week3").await;
        // structurally invalid candidates never compete
        seed_entry(&repo, &format!("wiki-{}", &hex_id('c')[..27]), "Mongraal", "w1").await;
        seed_entry(&repo, &hex_id('A'), "Mongraal", "w2").await;

        let resolver = IdentityResolver::new(&repo);
        let found = resolver.discover_account_id(player.player_id).await.unwrap();
        assert_eq!(found, Some(hex_id('a')));
    }

    #[tokio::test]
    async fn discovery_accepts_a_single_match_and_existing_links_win() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "Benjyfishy").await;
        seed_entry(&repo, &hex_id('d'), "benjyfishy", "s13-finals").await;

        let resolver = IdentityResolver::new(&repo);
        assert_eq!(
            resolver.discover_account_id(player.player_id).await.unwrap(),
            Some(hex_id('d'))
        );

        // once linked, discovery returns the stored id even if rows disagree
        assert!(resolver
            .link_account_id(player.player_id, &hex_id('d'))
            .await
            .unwrap());
        seed_entry(&repo, &hex_id('e'), "Benjyfishy", "s14-week1").await;
        seed_entry(&repo, &hex_id('e'), "Benjyfishy", "s14-week2").await;
        assert_eq!(
            resolver.discover_account_id(player.player_id).await.unwrap(),
            Some(hex_id('d'))
        );
    }

    #[tokio::test]
    async fn discovery_matches_historical_igns() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "NewName").await;
        let resolver = IdentityResolver::new(&repo);
        resolver.update_ign(player.player_id, "FreshIgn").await.unwrap();

        seed_entry(&repo, &hex_id('f'), "newname", "old-event").await;
        assert_eq!(
            resolver.discover_account_id(player.player_id).await.unwrap(),
            Some(hex_id('f'))
        );
    }

    #[tokio::test]
    async fn linking_is_idempotent_and_conflicts_refuse() {
        let repo = MemoryRepository::new();
        let first = seed_player(&repo, "First").await;
        let second = seed_player(&repo, "Second").await;
        let resolver = IdentityResolver::new(&repo);

        assert!(resolver
            .link_account_id(first.player_id, &hex_id('a'))
            .await
            .unwrap());
        assert!(resolver
            .link_account_id(first.player_id, &hex_id('a'))
            .await
            .unwrap());
        assert!(!resolver
            .link_account_id(second.player_id, &hex_id('a'))
            .await
            .unwrap());

        let stored = repo.player(second.player_id).await.unwrap().unwrap();
        assert_eq!(stored.epic_account_id, None);
    }

    #[tokio::test]
    async fn linking_propagates_to_roster_and_transfers() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "Queasy").await;
        repo.upsert_roster_slot(&RosterSlot {
            team_slug: "guild".into(),
            player_ign: "queasy".into(),
            player_id: None,
            epic_account_id: None,
            join_date: None,
        })
        .await
        .unwrap();
        repo.upsert_transfer(&Transfer {
            slug: "2023-01-10-queasy-joins-guild".into(),
            date: NaiveDate::from_ymd_opt(2023, 1, 10).unwrap(),
            player_ign: "Queasy".into(),
            player_id: Some(player.player_id),
            epic_account_id: None,
            from_team: None,
            to_team: Some("guild".into()),
        })
        .await
        .unwrap();

        let resolver = IdentityResolver::new(&repo);
        assert!(resolver
            .link_account_id(player.player_id, &hex_id('9'))
            .await
            .unwrap());

        let slots = repo.roster_slots().await.unwrap();
        assert_eq!(slots[0].epic_account_id, Some(hex_id('9')));
        assert_eq!(slots[0].player_id, Some(player.player_id));
        let transfers = repo.transfers().await.unwrap();
        assert_eq!(transfers[0].epic_account_id, Some(hex_id('9')));
    }

    #[tokio::test]
    async fn resolve_tries_account_id_before_uuid() {
        let repo = MemoryRepository::new();
        let resolver = IdentityResolver::new(&repo);

        // one player owns the hex string as an account id, another has the
        // same 32 hex chars as their UUID
        let ambiguous = hex_id('7');
        let holder = {
            let mut p = Player::new("Holder", None);
            p.epic_account_id = Some(ambiguous.clone());
            repo.upsert_player(&p).await.unwrap();
            p
        };
        let mut trap = Player::new("Trap", None);
        trap.player_id = Uuid::parse_str(&ambiguous).unwrap();
        repo.upsert_player(&trap).await.unwrap();

        let hit = resolver.resolve(&ambiguous).await.unwrap().unwrap();
        assert_eq!(hit.player_id, holder.player_id);

        // hyphenated UUID form no longer looks like an account id
        let by_uuid = resolver
            .resolve(&trap.player_id.hyphenated().to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_uuid.player_id, trap.player_id);
    }

    #[tokio::test]
    async fn resolve_falls_back_to_wiki_url_and_ign() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "Aqua").await;
        let resolver = IdentityResolver::new(&repo);

        let by_url = resolver
            .resolve("https://liquipedia.net/fortnite/Aqua")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_url.player_id, player.player_id);

        let by_ign = resolver.resolve("aqua").await.unwrap().unwrap();
        assert_eq!(by_ign.player_id, player.player_id);

        assert!(resolver.resolve("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ign_updates_keep_one_open_history_span() {
        let repo = MemoryRepository::new();
        let player = seed_player(&repo, "Original").await;
        let resolver = IdentityResolver::new(&repo);

        assert!(!resolver.update_ign(player.player_id, "ORIGINAL").await.unwrap());
        assert!(resolver.update_ign(player.player_id, "Rebrand").await.unwrap());

        let stored = repo.player(player.player_id).await.unwrap().unwrap();
        assert_eq!(stored.current_ign, "Rebrand");
        assert_eq!(stored.ign_history.len(), 2);
        let open: Vec<_> = stored
            .ign_history
            .iter()
            .filter(|r| r.used_until.is_none())
            .collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].ign, "Rebrand");
        assert!(stored.uses_ign("original"));
    }

    #[tokio::test]
    async fn reconcile_links_unlinked_players() {
        let repo = MemoryRepository::new();
        let a = seed_player(&repo, "PlayerA").await;
        let _b = seed_player(&repo, "PlayerB").await;
        let mut c = Player::new("PlayerC", None);
        c.epic_account_id = Some(hex_id('c'));
        repo.upsert_player(&c).await.unwrap();

        seed_entry(&repo, &hex_id('a'), "PlayerA", "event-1").await;
        seed_entry(&repo, &hex_id('a'), "playera", "event-2").await;

        let resolver = IdentityResolver::new(&repo);
        let summary = resolver.reconcile_all().await.unwrap();
        assert_eq!(summary.linked, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.already_linked, 1);
        assert_eq!(summary.conflicts, 0);

        let linked = repo.player(a.player_id).await.unwrap().unwrap();
        assert_eq!(linked.epic_account_id, Some(hex_id('a')));
    }
}
