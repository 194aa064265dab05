use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("iso date regex"))
}

/// Find an embedded ISO `YYYY-MM-DD` date anywhere in the text. Returns the
/// first substring that is also a real calendar date; month names, partial
/// dates and placeholders yield `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    iso_re().captures_iter(text).find_map(|cap| {
        let year = cap[1].parse().ok()?;
        let month = cap[2].parse().ok()?;
        let day = cap[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_embedded_iso_dates() {
        assert_eq!(
            parse_date("2023-05-14 Finals"),
            NaiveDate::from_ymd_opt(2023, 5, 14)
        );
        assert_eq!(
            parse_date("Week 3 (2024-02-29)"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn rejects_non_iso_text() {
        assert_eq!(parse_date("May 2023"), None);
        assert_eq!(parse_date("TBD"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn skips_impossible_calendar_dates() {
        assert_eq!(parse_date("2023-13-45"), None);
        // first match is invalid, second is real
        assert_eq!(
            parse_date("2023-00-00 to 2023-06-01"),
            NaiveDate::from_ymd_opt(2023, 6, 1)
        );
    }
}
