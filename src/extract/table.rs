//! Wiki table extraction. Stateless over a parsed document: tables are
//! detected by their headers, then streamed as [`RawRow`]s that keep the
//! per-cell sort metadata and anchors the name strategies need.
//!
//! `Html` documents are not `Send`; callers that upsert between rows should
//! collect the rows they need and drop the document before awaiting.

use std::sync::OnceLock;

use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Result rows narrower than this are layout noise (separators, notes).
const MIN_RESULT_CELLS: usize = 4;

const DATE_HEADER_TOKENS: &[&str] = &["date"];
const PRIZE_HEADER_TOKENS: &[&str] = &["prize", "earnings", "winnings"];
const PLACEMENT_HEADER_TOKENS: &[&str] = &["place", "position", "rank", "standing"];

fn table_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("table").expect("static selector"))
}

fn row_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("tr").expect("static selector"))
}

fn header_cell_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("th").expect("static selector"))
}

fn data_cell_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("td").expect("static selector"))
}

fn link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a").expect("static selector"))
}

/// An anchor found inside a table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellLink {
    pub href: String,
    pub title: Option<String>,
    pub text: String,
}

/// One table cell: flattened display text, the MediaWiki `data-sort-value`
/// attribute when present (often a fuller name than the display text), and
/// the cell's anchors in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    pub sort_value: Option<String>,
    pub links: Vec<CellLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn cell(&self, idx: usize) -> Option<&RawCell> {
        self.cells.get(idx)
    }

    /// Display text of a cell, empty when the column is absent from the row.
    pub fn cell_text(&self, idx: usize) -> &str {
        self.cells.get(idx).map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn sort_values(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .filter_map(|c| c.sort_value.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn links(&self) -> impl Iterator<Item = &CellLink> {
        self.cells.iter().flat_map(|c| c.links.iter())
    }
}

/// Any table with a recognizable header row, headers lowercased.
pub struct WikiTable<'a> {
    table: ElementRef<'a>,
    pub headers: Vec<String>,
}

impl<'a> WikiTable<'a> {
    /// Index of the first header containing any of `tokens`.
    pub fn column(&self, tokens: &[&str]) -> Option<usize> {
        find_column(&self.headers, tokens)
    }

    /// Lazily yields data rows; header rows (`th` cells) and cell-less rows
    /// are dropped.
    pub fn rows(&self) -> impl Iterator<Item = RawRow> + 'a {
        self.table
            .select(row_selector())
            .filter(|row| row.select(header_cell_selector()).next().is_none())
            .filter_map(|row| {
                let cells: Vec<RawCell> =
                    row.select(data_cell_selector()).map(extract_cell).collect();
                (!cells.is_empty()).then_some(RawRow { cells })
            })
    }
}

/// Every table in the document that has a header row.
pub fn tables(doc: &Html) -> Vec<WikiTable<'_>> {
    doc.select(table_selector())
        .filter_map(|table| {
            let headers = header_texts(table);
            (!headers.is_empty()).then_some(WikiTable { table, headers })
        })
        .collect()
}

/// Where the three interesting columns live in a qualifying result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub placement: usize,
    pub prize: usize,
}

impl ColumnMap {
    /// Keyword match against header texts; positional fallbacks when a
    /// keyword is missing: date to the first column, prize to the last,
    /// placement to the column after the date.
    fn detect(headers: &[String]) -> Self {
        let last = headers.len().saturating_sub(1);
        Self {
            date: find_column(headers, DATE_HEADER_TOKENS).unwrap_or(0),
            placement: find_column(headers, PLACEMENT_HEADER_TOKENS).unwrap_or(1),
            prize: find_column(headers, PRIZE_HEADER_TOKENS).unwrap_or(last),
        }
    }
}

fn find_column(headers: &[String], tokens: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| tokens.iter().any(|t| h.contains(t)))
}

/// A table that qualifies for earnings extraction: its header row mentions
/// both a date-like and a prize-like column.
pub struct ResultsTable<'a> {
    inner: WikiTable<'a>,
    pub columns: ColumnMap,
}

impl<'a> ResultsTable<'a> {
    /// Data rows wide enough to be results; anything narrower than
    /// [`MIN_RESULT_CELLS`] is dropped without counting anywhere.
    pub fn rows(&self) -> impl Iterator<Item = RawRow> + 'a {
        self.inner
            .rows()
            .filter(|row| row.cells.len() >= MIN_RESULT_CELLS)
    }
}

/// The document's result tables, with their column maps.
pub fn qualifying_tables(doc: &Html) -> Vec<ResultsTable<'_>> {
    tables(doc)
        .into_iter()
        .filter_map(|inner| {
            let has_date = find_column(&inner.headers, DATE_HEADER_TOKENS).is_some();
            let has_prize = find_column(&inner.headers, PRIZE_HEADER_TOKENS).is_some();
            if !(has_date && has_prize) {
                return None;
            }
            let columns = ColumnMap::detect(&inner.headers);
            debug!(?columns, headers = inner.headers.len(), "qualifying table");
            Some(ResultsTable { inner, columns })
        })
        .collect()
}

/// Lowercased texts of the first row that contains `th` cells.
fn header_texts(table: ElementRef<'_>) -> Vec<String> {
    table
        .select(row_selector())
        .find_map(|row| {
            let headers: Vec<String> = row
                .select(header_cell_selector())
                .map(|th| flatten_text(th).to_lowercase())
                .collect();
            (!headers.is_empty()).then_some(headers)
        })
        .unwrap_or_default()
}

fn extract_cell(cell: ElementRef<'_>) -> RawCell {
    let links = cell
        .select(link_selector())
        .filter_map(|a| {
            let href = a.value().attr("href")?.to_string();
            Some(CellLink {
                href,
                title: a.value().attr("title").map(str::to_string),
                text: flatten_text(a),
            })
        })
        .collect();
    RawCell {
        text: flatten_text(cell),
        sort_value: cell
            .value()
            .attr("data-sort-value")
            .map(|v| v.trim().to_string()),
        links,
    }
}

/// Text content with runs of whitespace (including newlines between child
/// nodes) collapsed to single spaces.
pub(crate) fn flatten_text(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
    <html><body>
    <table class="wikitable sortable">
      <tr><th>Date</th><th>Place</th><th>Tier</th><th>Tournament</th><th>Prize</th></tr>
      <tr>
        <td>2023-05-14</td><td>1st</td><td>S-Tier</td>
        <td data-sort-value="FNCS Chapter 4 Season 2 Grand Finals">
          <a href="/fortnite/FNCS/Chapter_4_Season_2" title="FNCS Chapter 4 Season 2">FNCS C4S2</a>
        </td>
        <td>$10,000</td>
      </tr>
      <tr><td colspan="5">Season break</td></tr>
      <tr>
        <td>2023-06-02</td><td>9-16</td><td>A-Tier</td>
        <td><a href="/fortnite/Cash_Cup/June" title="Cash Cup June Edition">Cash Cup</a></td>
        <td>$500</td>
      </tr>
    </table>
    <table class="wikitable">
      <tr><th>Player</th><th>Team</th></tr>
      <tr><td>Someone</td><td>Somewhere</td></tr>
    </table>
    </body></html>
    "#;

    #[test]
    fn only_tables_with_date_and_prize_headers_qualify() {
        let doc = Html::parse_document(RESULTS_PAGE);
        let tables = qualifying_tables(&doc);
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].columns,
            ColumnMap {
                date: 0,
                placement: 1,
                prize: 4
            }
        );
    }

    #[test]
    fn short_rows_and_header_rows_are_dropped() {
        let doc = Html::parse_document(RESULTS_PAGE);
        let tables = qualifying_tables(&doc);
        let rows: Vec<RawRow> = tables[0].rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cell_text(0), "2023-05-14");
        assert_eq!(rows[1].cell_text(1), "9-16");
    }

    #[test]
    fn generic_tables_keep_narrow_rows() {
        let doc = Html::parse_document(RESULTS_PAGE);
        let all = tables(&doc);
        assert_eq!(all.len(), 2);
        let roster = &all[1];
        assert_eq!(roster.column(&["player"]), Some(0));
        assert_eq!(roster.column(&["prize"]), None);
        let rows: Vec<RawRow> = roster.rows().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell_text(1), "Somewhere");
    }

    #[test]
    fn cells_carry_sort_values_and_links() {
        let doc = Html::parse_document(RESULTS_PAGE);
        let tables = qualifying_tables(&doc);
        let row = tables[0].rows().next().unwrap();
        assert_eq!(
            row.sort_values().next(),
            Some("FNCS Chapter 4 Season 2 Grand Finals")
        );
        let link = row.links().next().unwrap();
        assert_eq!(link.href, "/fortnite/FNCS/Chapter_4_Season_2");
        assert_eq!(link.title.as_deref(), Some("FNCS Chapter 4 Season 2"));
        assert_eq!(link.text, "FNCS C4S2");
    }

    #[test]
    fn placement_falls_back_to_second_column() {
        let html = r#"<table>
          <tr><th>Start date</th><th>Result</th><th>Team</th><th>Prize money</th></tr>
          <tr><td>2024-01-05</td><td>2nd</td><td>Duo</td><td>$100</td></tr>
        </table>"#;
        let doc = Html::parse_document(html);
        let tables = qualifying_tables(&doc);
        assert_eq!(tables.len(), 1);
        // "Result" is not a placement keyword: falls back to index 1
        assert_eq!(
            tables[0].columns,
            ColumnMap {
                date: 0,
                placement: 1,
                prize: 3
            }
        );
    }
}
