//! Domain records shared across extraction, ingestion, and identity resolution.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final placement in a tournament. `Unranked` covers TBD/DNF/qualifier rows
/// where the source never committed to a number; it serializes as the legacy
/// sentinel so stored rows stay readable, but code must match on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Known(u32),
    Unranked,
}

impl Placement {
    /// Sentinel used at the serialization boundary for [`Placement::Unranked`].
    pub const UNRANKED_SENTINEL: u32 = 999;

    pub fn number(self) -> u32 {
        match self {
            Placement::Known(n) => n,
            Placement::Unranked => Self::UNRANKED_SENTINEL,
        }
    }

    pub fn from_number(n: u32) -> Self {
        if n == Self::UNRANKED_SENTINEL {
            Placement::Unranked
        } else {
            Placement::Known(n)
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Placement::Known(_))
    }
}

impl Serialize for Placement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.number())
    }
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Placement::from_number(u32::deserialize(deserializer)?))
    }
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Known(n) => write!(f, "{n}"),
            Placement::Unranked => f.write_str("unranked"),
        }
    }
}

/// One prize-money result for one player. Unique per (player, tournament_id);
/// `amount` is strictly positive for every persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningRecord {
    pub tournament_id: String,
    pub tournament_name: String,
    pub tournament_date: NaiveDate,
    pub placement: Placement,
    pub amount: BigDecimal,
}

/// One span of a player's IGN history. An open span (`used_until: None`) is
/// the name currently in use; a player has at most one open span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnRecord {
    pub ign: String,
    pub used_from: DateTime<Utc>,
    pub used_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: Uuid,
    pub current_ign: String,
    /// 32-lowercase-hex platform account id; unique across players once set.
    pub epic_account_id: Option<String>,
    pub wiki_url: Option<String>,
    pub ign_history: Vec<IgnRecord>,
}

impl Player {
    pub fn new(ign: impl Into<String>, wiki_url: Option<String>) -> Self {
        let ign = ign.into();
        Self {
            player_id: Uuid::new_v4(),
            ign_history: vec![IgnRecord {
                ign: ign.clone(),
                used_from: Utc::now(),
                used_until: None,
            }],
            current_ign: ign,
            epic_account_id: None,
            wiki_url,
        }
    }

    /// Every IGN this player has ever used, current first, no duplicates.
    pub fn known_igns(&self) -> Vec<&str> {
        let mut igns: Vec<&str> = vec![self.current_ign.as_str()];
        for rec in &self.ign_history {
            if !igns.iter().any(|known| known.eq_ignore_ascii_case(&rec.ign)) {
                igns.push(rec.ign.as_str());
            }
        }
        igns
    }

    pub fn uses_ign(&self, ign: &str) -> bool {
        self.known_igns()
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ign))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub slug: String,
    pub name: String,
    pub date: NaiveDate,
    pub tier: Option<String>,
    pub prize_pool: Option<BigDecimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub slug: String,
    pub name: String,
    pub region: Option<String>,
    pub wiki_url: Option<String>,
}

/// Membership of one player in one team roster. `epic_account_id` is a
/// denormalized copy kept in step by the identity resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub team_slug: String,
    pub player_ign: String,
    pub player_id: Option<Uuid>,
    pub epic_account_id: Option<String>,
    pub join_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub slug: String,
    pub date: NaiveDate,
    pub player_ign: String,
    pub player_id: Option<Uuid>,
    pub epic_account_id: Option<String>,
    pub from_team: Option<String>,
    pub to_team: Option<String>,
}

/// Platform-side leaderboard row; the raw material for account-id discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub account_id: String,
    pub display_name: String,
    pub event_id: String,
    pub rank: u32,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event_id: String,
    pub window_id: String,
    pub display_name: String,
    pub begin_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub kind: String,
    pub key: String,
    pub label: String,
    pub payload: serde_json::Value,
}

/// Why scraped earnings rows were not persisted, one bucket per row.
/// Rows skipped silently (header rows, short rows, `-` prizes) appear nowhere.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReasonCounters {
    pub no_date: usize,
    pub no_placement: usize,
    pub no_tournament_name: usize,
    pub no_positive_earnings: usize,
    pub duplicate: usize,
}

impl SkipReasonCounters {
    pub fn total(&self) -> usize {
        self.no_date
            + self.no_placement
            + self.no_tournament_name
            + self.no_positive_earnings
            + self.duplicate
    }

    pub fn merge(&mut self, other: &SkipReasonCounters) {
        self.no_date += other.no_date;
        self.no_placement += other.no_placement;
        self.no_tournament_name += other.no_tournament_name;
        self.no_positive_earnings += other.no_positive_earnings;
        self.duplicate += other.duplicate;
    }
}

impl std::fmt::Display for SkipReasonCounters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no_date={} no_placement={} no_tournament_name={} no_positive_earnings={} duplicate={}",
            self.no_date,
            self.no_placement,
            self.no_tournament_name,
            self.no_positive_earnings,
            self.duplicate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_round_trips_through_sentinel() {
        assert_eq!(Placement::Known(3).number(), 3);
        assert_eq!(Placement::Unranked.number(), 999);
        assert_eq!(Placement::from_number(999), Placement::Unranked);
        assert_eq!(Placement::from_number(12), Placement::Known(12));
    }

    #[test]
    fn known_igns_deduplicates_case_insensitively() {
        let mut player = Player::new("Mongraal", None);
        player.ign_history.push(IgnRecord {
            ign: "mongraal".into(),
            used_from: Utc::now(),
            used_until: Some(Utc::now()),
        });
        player.ign_history.push(IgnRecord {
            ign: "FaZe Mongraal".into(),
            used_from: Utc::now(),
            used_until: Some(Utc::now()),
        });
        assert_eq!(player.known_igns(), vec!["Mongraal", "FaZe Mongraal"]);
        assert!(player.uses_ign("MONGRAAL"));
        assert!(!player.uses_ign("Benjyfishy"));
    }

    #[test]
    fn skip_counters_merge_and_total() {
        let mut a = SkipReasonCounters {
            no_date: 1,
            duplicate: 2,
            ..Default::default()
        };
        let b = SkipReasonCounters {
            no_positive_earnings: 3,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.total(), 6);
    }
}
