//! Tournament identity: display-name strategies over raw rows, plus the
//! stable dedup key derived from date and name.

use chrono::NaiveDate;
use tracing::debug;

use super::table::RawRow;

/// Substrings that mark a value as a tier/recurrence label rather than a
/// tournament name.
pub const TIER_LABEL_TOKENS: &[&str] = &[
    "Tier", "S-Tier", "A-Tier", "B-Tier", "C-Tier", "D-Tier", "Weekly",
];

/// Sort values at or below this length are codes, not names.
const MIN_SORT_NAME_CHARS: usize = 10;
/// First segment of a `" / "` compound must exceed this to stand alone.
const MIN_COMPOUND_SEGMENT_CHARS: usize = 20;
/// Link-derived names at or below this length are navigation stubs.
const MIN_LINK_NAME_CHARS: usize = 8;
/// Dedup keys are clamped to fit the repository key column.
pub const MAX_KEY_CHARS: usize = 100;

pub struct NameContext<'a> {
    /// Game namespace segment of wiki paths, e.g. `fortnite`.
    pub namespace: &'a str,
}

pub type NameStrategy = fn(&RawRow, &NameContext<'_>) -> Option<String>;

/// Ordered name strategies; the first hit wins. Each entry is independently
/// testable and the label shows up in debug logs.
pub const NAME_STRATEGIES: &[(&str, NameStrategy)] = &[
    ("sort-value", from_sort_value),
    ("namespace-link", from_namespace_link),
];

/// Resolve the tournament display name for a result row, if any strategy
/// finds one.
pub fn tournament_name(row: &RawRow, ctx: &NameContext<'_>) -> Option<String> {
    for (label, strategy) in NAME_STRATEGIES {
        if let Some(name) = strategy(row, ctx) {
            debug!(strategy = label, name = %name, "tournament name resolved");
            return Some(name);
        }
    }
    None
}

/// First sort value that reads as a full tournament name: long enough, not a
/// tier label, and for `" / "` compounds only when the first segment can
/// stand alone (it then becomes the name).
fn from_sort_value(row: &RawRow, _ctx: &NameContext<'_>) -> Option<String> {
    row.sort_values().find_map(|value| {
        if value.chars().count() <= MIN_SORT_NAME_CHARS {
            return None;
        }
        if TIER_LABEL_TOKENS.iter().any(|t| value.contains(t)) {
            return None;
        }
        match value.split_once(" / ") {
            Some((first, _)) => {
                let first = first.trim();
                (first.chars().count() > MIN_COMPOUND_SEGMENT_CHARS).then(|| first.to_string())
            }
            None => Some(value.to_string()),
        }
    })
}

/// First anchor that points into the game namespace and is not a listing or
/// tier link; the anchor title is preferred over its display text.
fn from_namespace_link(row: &RawRow, ctx: &NameContext<'_>) -> Option<String> {
    let ns_segment = format!("/{}/", ctx.namespace);
    row.links().find_map(|link| {
        if !link.href.contains(&ns_segment) || is_listing_href(&link.href) {
            return None;
        }
        if TIER_LABEL_TOKENS.iter().any(|t| link.text.contains(t)) {
            return None;
        }
        let name = link
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(link.text.trim());
        (name.chars().count() > MIN_LINK_NAME_CHARS).then(|| name.to_string())
    })
}

fn is_listing_href(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.contains("Portal:") || path.trim_end_matches('/').ends_with("Tournaments")
}

/// Collapse each run of non-alphanumeric characters into a single hyphen,
/// lowercasing the rest; leading/trailing hyphens are trimmed.
pub fn slugify(input: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Slug of `raw`, lowercased and clamped to [`MAX_KEY_CHARS`].
pub fn slug_key(raw: &str) -> String {
    slugify(&raw.to_lowercase()).chars().take(MAX_KEY_CHARS).collect()
}

/// Stable dedup key for one tournament: slug of `date-name`. Same date and
/// same name always produce the same key.
pub fn tournament_key(date: NaiveDate, name: &str) -> String {
    slug_key(&format!("{}-{}", date.format("%Y-%m-%d"), name))
}
