//! Earnings deduplication and upsert. One engine instance covers one
//! player's results-page run: it owns the in-run dedup set and the skip
//! accounting, while cross-run idempotence comes from the repository's
//! write-if-different upserts.

use std::collections::HashSet;

use anyhow::Result;
use bigdecimal::{BigDecimal, Zero};
use scraper::Html;
use tracing::debug;
use uuid::Uuid;

use crate::extract::table::{qualifying_tables, ColumnMap, RawRow};
use crate::extract::tournament::{tournament_key, tournament_name, NameContext};
use crate::model::{EarningRecord, Placement, SkipReasonCounters};
use crate::normalization::{parse_date, parse_earnings, parse_placement};
use crate::repo::{Repository, UpsertTally};

pub struct EarningsIngest<'a> {
    repo: &'a dyn Repository,
    player_id: Uuid,
    seen: HashSet<String>,
    pub tally: UpsertTally,
    pub skipped: SkipReasonCounters,
}

impl<'a> EarningsIngest<'a> {
    pub fn new(repo: &'a dyn Repository, player_id: Uuid) -> Self {
        Self {
            repo,
            player_id,
            seen: HashSet::new(),
            tally: UpsertTally::default(),
            skipped: SkipReasonCounters::default(),
        }
    }

    /// Run every qualifying table of a results page through the engine.
    ///
    /// Rows are collected per table before any write so the parsed document
    /// (which is not `Send`) never lives across an await point.
    pub async fn ingest_document(&mut self, html: &str, ctx: &NameContext<'_>) -> Result<()> {
        let extracted: Vec<(ColumnMap, Vec<RawRow>)> = {
            let doc = Html::parse_document(html);
            qualifying_tables(&doc)
                .into_iter()
                .map(|table| (table.columns, table.rows().collect()))
                .collect()
        };
        for (columns, rows) in extracted {
            for row in rows {
                self.ingest_row(&row, columns, ctx).await?;
            }
        }
        Ok(())
    }

    /// Every row lands in exactly one bucket: persisted, counted against one
    /// skip reason, or silently ignored. The precondition checks run in a
    /// fixed order so a row failing several of them is counted once,
    /// deterministically.
    async fn ingest_row(
        &mut self,
        row: &RawRow,
        columns: ColumnMap,
        ctx: &NameContext<'_>,
    ) -> Result<()> {
        let Some(date) = parse_date(row.cell_text(columns.date)) else {
            self.skipped.no_date += 1;
            return Ok(());
        };

        let placement = parse_placement(row.cell_text(columns.placement));
        if placement == Placement::Unranked {
            self.skipped.no_placement += 1;
            return Ok(());
        }

        let Some(name) = tournament_name(row, ctx) else {
            self.skipped.no_tournament_name += 1;
            return Ok(());
        };

        // "-" is the wiki's explicit no-prize marker: not an error, not a
        // counter, the row just never existed for earnings purposes.
        let prize_text = row.cell_text(columns.prize).trim();
        if prize_text == "-" {
            return Ok(());
        }
        let amount = parse_earnings(prize_text);
        if amount <= BigDecimal::zero() {
            self.skipped.no_positive_earnings += 1;
            return Ok(());
        }

        let key = tournament_key(date, &name);
        if !self.seen.insert(key.clone()) {
            debug!(key = %key, "duplicate result row in run");
            self.skipped.duplicate += 1;
            return Ok(());
        }

        let record = EarningRecord {
            tournament_id: key,
            tournament_name: name,
            tournament_date: date,
            placement,
            amount,
        };
        let outcome = self.repo.upsert_earning(self.player_id, &record).await?;
        self.tally.record(outcome);
        Ok(())
    }
}
