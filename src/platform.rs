//! Platform live-data payloads. The wire shapes stay private to this module;
//! callers get decoded domain records. Unknown fields are ignored, missing
//! optional fields default, and malformed documents fail with context.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{ReferenceEntry, ResultEntry, ScheduledEvent};

#[derive(Debug, Deserialize)]
struct RefItem {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LeaderboardResp {
    #[serde(default)]
    entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntry {
    account_id: String,
    display_name: String,
    event_id: String,
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    points: u32,
}

#[derive(Debug, Deserialize)]
struct ScheduleResp {
    #[serde(default)]
    events: Vec<ScheduleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleEvent {
    event_id: String,
    window_id: String,
    #[serde(default)]
    display_name: String,
    begin_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default)]
    region: Option<String>,
}

/// Decode the reference document into `(kind, key, label)` entries. Each raw
/// item rides along as payload so later consumers can read fields this
/// pipeline does not model.
pub fn decode_reference(doc: &Value) -> Result<Vec<ReferenceEntry>> {
    let mut out = Vec::new();
    for (kind, list_key) in [("region", "regions"), ("season", "seasons")] {
        let Some(items) = doc.get(list_key).and_then(Value::as_array) else {
            continue;
        };
        for raw in items {
            let item: RefItem = serde_json::from_value(raw.clone())
                .with_context(|| format!("malformed {kind} entry"))?;
            out.push(ReferenceEntry {
                kind: kind.to_string(),
                key: item.id,
                label: item.name,
                payload: raw.clone(),
            });
        }
    }
    Ok(out)
}

pub fn decode_leaderboard(doc: &Value) -> Result<Vec<ResultEntry>> {
    let resp: LeaderboardResp =
        serde_json::from_value(doc.clone()).context("malformed leaderboard document")?;
    Ok(resp
        .entries
        .into_iter()
        .map(|e| ResultEntry {
            account_id: e.account_id,
            display_name: e.display_name,
            event_id: e.event_id,
            rank: e.rank,
            points: e.points,
        })
        .collect())
}

pub fn decode_schedule(doc: &Value) -> Result<Vec<ScheduledEvent>> {
    let resp: ScheduleResp =
        serde_json::from_value(doc.clone()).context("malformed schedule document")?;
    Ok(resp
        .events
        .into_iter()
        .map(|e| ScheduledEvent {
            event_id: e.event_id,
            window_id: e.window_id,
            display_name: e.display_name,
            begin_time: e.begin_time,
            end_time: e.end_time,
            region: e.region,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_document_flattens_to_kinded_entries() {
        let doc = json!({
            "regions": [{"id": "EU", "name": "Europe", "pop": 1}],
            "seasons": [{"id": "s13", "name": "Season 13"}],
            "ignored": true,
        });
        let entries = decode_reference(&doc).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "region");
        assert_eq!(entries[0].key, "EU");
        // the raw item survives as payload, extra fields included
        assert_eq!(entries[0].payload["pop"], 1);
        assert_eq!(entries[1].kind, "season");
        assert_eq!(entries[1].label, "Season 13");
    }

    #[test]
    fn leaderboard_entries_default_missing_counters() {
        let doc = json!({
            "entries": [{
                "accountId": "abc",
                "displayName": "Mongraal",
                "eventId": "epic_s13_week1"
            }]
        });
        let entries = decode_leaderboard(&doc).unwrap();
        assert_eq!(entries[0].display_name, "Mongraal");
        assert_eq!(entries[0].rank, 0);
        assert_eq!(entries[0].points, 0);
    }

    #[test]
    fn schedule_requires_window_times() {
        let good = json!({
            "events": [{
                "eventId": "epic_s13",
                "windowId": "w1",
                "displayName": "Week 1",
                "beginTime": "2023-05-14T17:00:00Z",
                "endTime": "2023-05-14T20:00:00Z",
                "region": "EU"
            }]
        });
        let events = decode_schedule(&good).unwrap();
        assert_eq!(events[0].window_id, "w1");
        assert_eq!(events[0].region.as_deref(), Some("EU"));

        let bad = json!({ "events": [{ "eventId": "x", "windowId": "w" }] });
        assert!(decode_schedule(&bad).is_err());
    }

    #[test]
    fn empty_documents_decode_to_empty_lists() {
        assert!(decode_reference(&json!({})).unwrap().is_empty());
        assert!(decode_leaderboard(&json!({})).unwrap().is_empty());
        assert!(decode_schedule(&json!({})).unwrap().is_empty());
    }
}
