use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};

/// Normalize a prize-money cell into an exact decimal amount.
///
/// Currency symbols and `,` thousands separators are dropped along with any
/// other non-numeric character, then the remainder is parsed as a decimal.
/// Anything unparseable (empty cells, `-`, `N/A`, multi-dot garbage) comes
/// back as zero, which downstream treats as "no prize". The minus sign is
/// stripped with the rest of the noise, so the result is never negative.
pub fn parse_earnings(text: &str) -> BigDecimal {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return BigDecimal::zero();
    }
    BigDecimal::from_str(&cleaned).unwrap_or_else(|_| BigDecimal::zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn parses_currency_formatted_amounts() {
        assert_eq!(parse_earnings("$12,345.67"), dec("12345.67"));
        assert_eq!(parse_earnings("€1,000"), dec("1000"));
        assert_eq!(parse_earnings("  450 USD "), dec("450"));
    }

    #[test]
    fn falls_back_to_zero_on_noise() {
        assert_eq!(parse_earnings("-"), BigDecimal::zero());
        assert_eq!(parse_earnings(""), BigDecimal::zero());
        assert_eq!(parse_earnings("N/A"), BigDecimal::zero());
        assert_eq!(parse_earnings("1.2.3"), BigDecimal::zero());
    }

    #[test]
    fn never_returns_negative() {
        assert!(parse_earnings("-500") >= BigDecimal::zero());
    }
}
