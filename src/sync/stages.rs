//! The seven stage bodies. Each is an async fn over the orchestrator's
//! shared handles and returns a [`StageSummary`]; the orchestrator owns the
//! catch boundary, state tokens, and reporting around them.
//!
//! Wiki pages are parsed into owned rows before any repository call so the
//! non-`Send` document never crosses an await.

use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::Result;
use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::extract::table::{flatten_text, qualifying_tables, tables, RawCell};
use crate::extract::tournament::{
    slug_key, slugify, tournament_key, tournament_name, NameContext, TIER_LABEL_TOKENS,
};
use crate::fetch::absolutize;
use crate::identity::IdentityResolver;
use crate::ingest::EarningsIngest;
use crate::model::{Player, RosterSlot, Team, Tournament, Transfer};
use crate::normalization::{parse_date, parse_earnings};
use crate::platform::{decode_leaderboard, decode_reference, decode_schedule};
use crate::repo::UpsertOutcome;
use crate::sync::{StageSummary, SyncOrchestrator};

/// Stage 1: tournament listing. One fetch of the tournament portal; every
/// qualifying table row with a date and a resolvable name becomes a
/// `Tournament` keyed by its dedup slug.
pub(crate) async fn sync_tournaments(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let url = orc.config.wiki_page("Portal:Tournaments");
    let html = orc.fetcher.fetch_html(&url).await?;
    let mut summary = StageSummary {
        visited: 1,
        ..Default::default()
    };
    for tournament in parse_tournament_rows(&html, &orc.config.wiki_namespace) {
        summary
            .tally
            .record(orc.repo.upsert_tournament(&tournament).await?);
    }
    Ok(summary)
}

fn parse_tournament_rows(html: &str, namespace: &str) -> Vec<Tournament> {
    let doc = Html::parse_document(html);
    let ctx = NameContext { namespace };
    let mut out = Vec::new();
    for table in qualifying_tables(&doc) {
        for row in table.rows() {
            let Some(date) = parse_date(row.cell_text(table.columns.date)) else {
                continue;
            };
            let Some(name) = tournament_name(&row, &ctx) else {
                continue;
            };
            let tier = row.cells.iter().find_map(|cell| {
                let text = cell.text.trim();
                TIER_LABEL_TOKENS
                    .iter()
                    .any(|t| text.contains(t))
                    .then(|| text.to_string())
            });
            let prize = parse_earnings(row.cell_text(table.columns.prize));
            let prize_pool = (prize > BigDecimal::zero()).then_some(prize);
            out.push(Tournament {
                slug: tournament_key(date, &name),
                name,
                date,
                tier,
                prize_pool,
            });
        }
    }
    out
}

/// Stage 2: team index plus one throttled fetch per team page. Upserts the
/// `Team` and its roster slots; identity fields on slots already linked by
/// later stages are carried over, never reset.
pub(crate) async fn sync_teams(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let index_url = orc.config.wiki_page("Portal:Teams");
    let index_html = orc.fetcher.fetch_html(&index_url).await?;
    let mut summary = StageSummary {
        visited: 1,
        ..Default::default()
    };

    let existing: HashMap<(String, String), RosterSlot> = orc
        .repo
        .roster_slots()
        .await?
        .into_iter()
        .map(|slot| {
            (
                (slot.team_slug.clone(), slot.player_ign.to_lowercase()),
                slot,
            )
        })
        .collect();

    for link in harvest_namespace_links(&index_html, &orc.config.wiki_namespace) {
        let name = link
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(link.text.trim())
            .to_string();
        let team_slug = slugify(&name);
        if team_slug.is_empty() {
            continue;
        }

        orc.throttle().await;
        let team_url = absolutize(&orc.config.wiki_base, &link.href)?;
        let page_html = match orc.fetcher.fetch_html(&team_url).await {
            Ok(html) => html,
            Err(err) => {
                warn!(team = %name, error = %err, "team page fetch failed");
                summary.failed_visits += 1;
                continue;
            }
        };
        summary.visited += 1;

        let page = parse_team_page(&page_html);
        let team = Team {
            slug: team_slug.clone(),
            name,
            region: page.region,
            wiki_url: Some(team_url),
        };
        summary.tally.record(orc.repo.upsert_team(&team).await?);

        for row in page.roster {
            let key = (team_slug.clone(), row.ign.to_lowercase());
            let mut slot = RosterSlot {
                team_slug: team_slug.clone(),
                player_ign: row.ign,
                player_id: None,
                epic_account_id: None,
                join_date: row.join_date,
            };
            if let Some(prev) = existing.get(&key) {
                slot.player_id = prev.player_id;
                slot.epic_account_id = prev.epic_account_id.clone();
                if slot.join_date.is_none() {
                    slot.join_date = prev.join_date;
                }
            }
            summary
                .tally
                .record(orc.repo.upsert_roster_slot(&slot).await?);
        }
    }
    Ok(summary)
}

struct TeamPage {
    region: Option<String>,
    roster: Vec<RosterRow>,
}

struct RosterRow {
    ign: String,
    join_date: Option<NaiveDate>,
}

/// Roster tables are the ones with a join-date column; the IGN comes from
/// the id/player column (first anchor text preferred over plain text).
fn parse_team_page(html: &str) -> TeamPage {
    let doc = Html::parse_document(html);
    let mut roster = Vec::new();
    for table in tables(&doc) {
        let Some(join_col) = table.column(&["join"]) else {
            continue;
        };
        let ign_col = table.column(&["id", "player", "name"]).unwrap_or(0);
        for row in table.rows() {
            let Some(cell) = row.cell(ign_col) else {
                continue;
            };
            let ign = display_name(cell);
            if ign.is_empty() {
                continue;
            }
            roster.push(RosterRow {
                ign,
                join_date: parse_date(row.cell_text(join_col)),
            });
        }
    }
    TeamPage {
        region: infobox_value(&doc, "Region:"),
        roster,
    }
}

fn div_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("div").expect("static selector"))
}

/// Value next to an infobox label, e.g. `Region:` on team pages.
fn infobox_value(doc: &Html, label: &str) -> Option<String> {
    doc.select(div_selector()).find_map(|div| {
        if flatten_text(div) != label {
            return None;
        }
        div.next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .map(flatten_text)
            .filter(|v| !v.is_empty())
    })
}

/// Stage 3: players behind roster slots. No fetches; reconciles the roster
/// state against player records, creating players for unlinked IGNs and
/// rotating the IGN history when a linked slot shows a new name.
pub(crate) async fn sync_players(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let resolver = IdentityResolver::new(orc.repo.as_ref());
    let mut summary = StageSummary::default();

    for mut slot in orc.repo.roster_slots().await? {
        summary.visited += 1;

        if let Some(player_id) = slot.player_id {
            let Some(player) = orc.repo.player(player_id).await? else {
                warn!(ign = %slot.player_ign, "roster slot points at a missing player");
                continue;
            };
            // the roster is the freshest IGN source
            if !player.current_ign.eq_ignore_ascii_case(&slot.player_ign)
                && resolver.update_ign(player_id, &slot.player_ign).await?
            {
                summary.tally.record(UpsertOutcome::Updated);
            }
            continue;
        }

        let guessed_url = player_page_url(&orc.config, &slot.player_ign);
        let player = match orc.repo.player_by_wiki_url(&guessed_url).await? {
            Some(player) => player,
            None => match orc.repo.player_by_ign(&slot.player_ign).await? {
                Some(mut player) => {
                    if player.wiki_url.is_none() {
                        player.wiki_url = Some(guessed_url.clone());
                        summary.tally.record(orc.repo.upsert_player(&player).await?);
                    }
                    player
                }
                None => {
                    let player = Player::new(slot.player_ign.clone(), Some(guessed_url.clone()));
                    summary.tally.record(orc.repo.upsert_player(&player).await?);
                    debug!(ign = %player.current_ign, "player created from roster");
                    player
                }
            },
        };

        slot.player_id = Some(player.player_id);
        if slot.epic_account_id.is_none() {
            slot.epic_account_id = player.epic_account_id.clone();
        }
        summary
            .tally
            .record(orc.repo.upsert_roster_slot(&slot).await?);
    }
    Ok(summary)
}

/// Wiki player pages are named by IGN, spaces as underscores.
fn player_page_url(config: &SyncConfig, ign: &str) -> String {
    config.wiki_page(&ign.trim().replace(' ', "_"))
}

/// Stage 4: platform reference data and recent leaderboard entries, one
/// throttled fetch each.
pub(crate) async fn sync_reference_data(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let mut summary = StageSummary::default();

    let doc = orc
        .fetcher
        .fetch_json(&orc.config.platform_endpoint("reference"))
        .await?;
    summary.visited += 1;
    for entry in decode_reference(&doc)? {
        summary
            .tally
            .record(orc.repo.upsert_reference_entry(&entry).await?);
    }

    orc.throttle().await;
    let doc = orc
        .fetcher
        .fetch_json(&orc.config.platform_endpoint("leaderboards/recent"))
        .await?;
    summary.visited += 1;
    for entry in decode_leaderboard(&doc)? {
        summary
            .tally
            .record(orc.repo.upsert_result_entry(&entry).await?);
    }
    Ok(summary)
}

/// Stage 5: wiki transfer list. Rows are keyed by a slug of
/// date + player + teams; identity fields survive re-scrapes and rows are
/// linked to known players by IGN.
pub(crate) async fn sync_transfers(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let url = orc.config.wiki_page("Transfers");
    let html = orc.fetcher.fetch_html(&url).await?;
    let mut summary = StageSummary {
        visited: 1,
        ..Default::default()
    };

    let existing: HashMap<String, Transfer> = orc
        .repo
        .transfers()
        .await?
        .into_iter()
        .map(|t| (t.slug.clone(), t))
        .collect();

    for row in parse_transfer_rows(&html) {
        let slug = transfer_key(
            row.date,
            &row.ign,
            row.from_team.as_deref(),
            row.to_team.as_deref(),
        );
        let mut transfer = Transfer {
            slug: slug.clone(),
            date: row.date,
            player_ign: row.ign,
            player_id: None,
            epic_account_id: None,
            from_team: row.from_team,
            to_team: row.to_team,
        };
        if let Some(prev) = existing.get(&slug) {
            transfer.player_id = prev.player_id;
            transfer.epic_account_id = prev.epic_account_id.clone();
        }
        if transfer.player_id.is_none() {
            if let Some(player) = orc.repo.player_by_ign(&transfer.player_ign).await? {
                transfer.player_id = Some(player.player_id);
                transfer.epic_account_id = player.epic_account_id.clone();
            }
        }
        summary
            .tally
            .record(orc.repo.upsert_transfer(&transfer).await?);
    }
    Ok(summary)
}

struct TransferRow {
    date: NaiveDate,
    ign: String,
    from_team: Option<String>,
    to_team: Option<String>,
}

/// Transfer tables carry a date and a player column; old/new team columns
/// are optional and `None`/`-`/empty mean teamless (joining from or leaving
/// to nowhere).
fn parse_transfer_rows(html: &str) -> Vec<TransferRow> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for table in tables(&doc) {
        let (Some(date_col), Some(player_col)) =
            (table.column(&["date"]), table.column(&["player", "id"]))
        else {
            continue;
        };
        let from_col = table.column(&["old", "from", "previous"]);
        let to_col = table.column(&["new", "to", "current"]);
        for row in table.rows() {
            let Some(date) = parse_date(row.cell_text(date_col)) else {
                continue;
            };
            let Some(cell) = row.cell(player_col) else {
                continue;
            };
            let ign = display_name(cell);
            if ign.is_empty() {
                continue;
            }
            out.push(TransferRow {
                date,
                ign,
                from_team: from_col.and_then(|col| team_name(row.cell_text(col))),
                to_team: to_col.and_then(|col| team_name(row.cell_text(col))),
            });
        }
    }
    out
}

pub(crate) fn transfer_key(
    date: NaiveDate,
    ign: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> String {
    slug_key(&format!(
        "{}-{}-{}-{}",
        date.format("%Y-%m-%d"),
        ign,
        from.unwrap_or("none"),
        to.unwrap_or("none")
    ))
}

/// Stage 6: platform event schedule.
pub(crate) async fn sync_schedule(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let doc = orc
        .fetcher
        .fetch_json(&orc.config.platform_endpoint("schedule"))
        .await?;
    let mut summary = StageSummary {
        visited: 1,
        ..Default::default()
    };
    for event in decode_schedule(&doc)? {
        summary
            .tally
            .record(orc.repo.upsert_scheduled_event(&event).await?);
    }
    Ok(summary)
}

/// Stage 7: per-player results pages, throttled, in a stable IGN order.
/// One failed page fetch skips that player; repository errors abort the
/// stage.
pub(crate) async fn sync_earnings(orc: &SyncOrchestrator) -> Result<StageSummary> {
    let mut players: Vec<Player> = orc
        .repo
        .players()
        .await?
        .into_iter()
        .filter(|p| p.wiki_url.is_some())
        .collect();
    players.sort_by(|a, b| {
        a.current_ign
            .to_lowercase()
            .cmp(&b.current_ign.to_lowercase())
    });
    if let Some(limit) = orc.config.earnings_player_limit {
        players.truncate(limit);
    }

    let ctx = NameContext {
        namespace: &orc.config.wiki_namespace,
    };
    let mut summary = StageSummary::default();
    for (idx, player) in players.iter().enumerate() {
        let Some(wiki_url) = player.wiki_url.as_deref() else {
            continue;
        };
        if idx > 0 {
            orc.throttle().await;
        }
        let results_url = format!("{}/Results", wiki_url.trim_end_matches('/'));
        let html = match orc.fetcher.fetch_html(&results_url).await {
            Ok(html) => html,
            Err(err) => {
                warn!(ign = %player.current_ign, error = %err, "results page fetch failed");
                summary.failed_visits += 1;
                continue;
            }
        };
        summary.visited += 1;

        let mut ingest = EarningsIngest::new(orc.repo.as_ref(), player.player_id);
        ingest.ingest_document(&html, &ctx).await?;
        debug!(ign = %player.current_ign, tally = %ingest.tally, "results page ingested");
        summary.tally.merge(&ingest.tally);
        summary.skipped.merge(&ingest.skipped);
    }
    Ok(summary)
}

/// First anchor text in the cell, else the cell text.
fn display_name(cell: &RawCell) -> String {
    cell.links
        .iter()
        .map(|link| link.text.trim())
        .find(|t| !t.is_empty())
        .unwrap_or(cell.text.trim())
        .to_string()
}

fn team_name(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() || text == "-" || text.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(text.to_string())
}

/// Anchors pointing at plain pages inside the game namespace: root-relative
/// `/{ns}/...` hrefs whose page segment has no `Namespace:` prefix. Deduped
/// by href, document order kept.
fn harvest_namespace_links(html: &str, namespace: &str) -> Vec<crate::extract::CellLink> {
    let doc = Html::parse_document(html);
    let prefix = format!("/{namespace}/");
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for anchor in doc.select(anchor_selector()) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let path = href.split(['?', '#']).next().unwrap_or(href);
        let Some(page) = path.strip_prefix(&prefix) else {
            continue;
        };
        if page.is_empty() || page.contains(':') {
            continue;
        }
        if !seen.insert(path.to_string()) {
            continue;
        }
        out.push(crate::extract::CellLink {
            href: path.to_string(),
            title: anchor.value().attr("title").map(str::to_string),
            text: flatten_text(anchor),
        });
    }
    out
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a").expect("static selector"))
}
