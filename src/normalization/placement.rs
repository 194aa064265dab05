use std::sync::OnceLock;

use regex::Regex;

use crate::model::Placement;

fn leading_int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)").expect("leading int regex"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "9-16", "9th - 16th", en/em dashes included
    RE.get_or_init(|| Regex::new(r"(\d+)[a-z]*\s*[-–—]\s*(\d+)").expect("range regex"))
}

fn top_n_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"top\s*(\d+)").expect("top-n regex"))
}

/// Normalize a placement cell. Tries, in order: a leading integer (`"3rd"`),
/// a range taking the lower bound (`"9-16"`), and `"top N"`. Cells that match
/// none of these (TBD, DNF, qualifier labels) are [`Placement::Unranked`].
pub fn parse_placement(text: &str) -> Placement {
    let cleaned = text.trim().to_ascii_lowercase();

    let number = leading_int(&cleaned)
        .or_else(|| range_lower_bound(&cleaned))
        .or_else(|| top_n(&cleaned));

    match number {
        Some(n) => Placement::Known(n),
        None => Placement::Unranked,
    }
}

fn leading_int(text: &str) -> Option<u32> {
    let cap = leading_int_re().captures(text)?;
    cap[1].parse().ok()
}

fn range_lower_bound(text: &str) -> Option<u32> {
    let cap = range_re().captures(text)?;
    cap[1].parse().ok()
}

fn top_n(text: &str) -> Option<u32> {
    let cap = top_n_re().captures(text)?;
    cap[1].parse().ok()
}
