use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?ix)
            ^\$?\s*(?P<low>\d[\d,]*(?:\.\d+)?)\s*(?P<low_unit>[kmb])?
            (?:\s*(?:-|–|to)\s*\$?\s*(?P<high>\d[\d,]*(?:\.\d+)?)\s*(?P<high_unit>[kmb])?)?
            (?:\s+[a-z].*)?$",
        )
        .expect("money range pattern is valid")
    })
}

/// Parses `$50K-$150K`, `$1.2M to $2M`, `$300K annually` or `75,000`.
///
/// A single amount yields an equal low and high bound. A missing unit on the low
/// bound inherits the high bound's unit (`$50-150K`). Ranges with low > high are
/// rejected.
pub fn parse_money_range(text: &str) -> Option<(Decimal, Decimal)> {
    let captures = range_pattern().captures(text.trim())?;

    let high_unit = captures.name("high_unit").map(|unit| unit.as_str());
    let low_unit = captures.name("low_unit").map(|unit| unit.as_str()).or(high_unit);
    let low = amount(captures.name("low")?.as_str(), low_unit)?;
    let high = match captures.name("high") {
        Some(high) => amount(high.as_str(), high_unit)?,
        None => low,
    };

    (low <= high).then_some((low, high))
}

fn amount(digits: &str, unit: Option<&str>) -> Option<Decimal> {
    let base = Decimal::from_str(&digits.replace(',', "")).ok()?;
    let multiplier = match unit.map(|unit| unit.to_ascii_lowercase()) {
        None => Decimal::ONE,
        Some(unit) if unit == "k" => Decimal::from(1_000),
        Some(unit) if unit == "m" => Decimal::from(1_000_000),
        Some(unit) if unit == "b" => Decimal::from(1_000_000_000),
        Some(_) => return None,
    };
    base.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::parse_money_range;

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn parses_suffixed_ranges() {
        assert_eq!(parse_money_range("$50K-$150K"), Some((d(50_000), d(150_000))));
        assert_eq!(parse_money_range("$1.5M to $2M"), Some((d(1_500_000), d(2_000_000))));
        assert_eq!(parse_money_range("$50-150K"), Some((d(50_000), d(150_000))));
    }

    #[test]
    fn single_amount_with_trailing_words_is_a_point_range() {
        assert_eq!(parse_money_range("$300K annually"), Some((d(300_000), d(300_000))));
        assert_eq!(parse_money_range("75,000"), Some((d(75_000), d(75_000))));
    }

    #[test]
    fn rejects_text_and_inverted_ranges() {
        assert_eq!(parse_money_range("significant savings"), None);
        assert_eq!(parse_money_range("40% efficiency improvement"), None);
        assert_eq!(parse_money_range("$200K-$100K"), None);
    }
}
