use serde::{Deserialize, Serialize};

/// Placeholder shown wherever a market is not offered
pub const NOT_OFFERED: &str = "N/A";

/// American rendering of an offered price with no winnings (decimal 1.0 or less)
pub const NO_RETURN_AMERICAN: &str = "-∞";

/// Largest denominator tried when rendering fractional odds
const MAX_DENOMINATOR: i64 = 100;

/// How prices are shown to a visitor. Always passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OddsFormat {
    #[default]
    Decimal,
    Fractional,
    American,
}

impl OddsFormat {
    /// Unknown names fall back to decimal
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "decimal" | "eu" => OddsFormat::Decimal,
            "fractional" | "uk" => OddsFormat::Fractional,
            "american" | "us" | "moneyline" => OddsFormat::American,
            other => {
                tracing::debug!(format = other, "unknown odds format, using decimal");
                OddsFormat::Decimal
            }
        }
    }
}

/// Render a decimal price in the requested format
pub fn format_price(price: Option<f64>, format: OddsFormat) -> String {
    let Some(price) = price.filter(|p| p.is_finite() && *p > 0.0) else {
        return NOT_OFFERED.to_string();
    };

    match format {
        OddsFormat::Decimal => format!("{:.2}", price),
        OddsFormat::Fractional => match decimal_to_fractional(price) {
            Some((num, den)) => format!("{}/{}", num, den),
            None => "0/1".to_string(),
        },
        OddsFormat::American => match decimal_to_american(price) {
            Some(odds) => format!("{:+}", odds),
            None => NO_RETURN_AMERICAN.to_string(),
        },
    }
}

/// Convert decimal odds to a reduced fraction of the winnings (2.10 -> 11/10).
/// Prices of 1.0 or less win nothing and give `0/1`.
pub fn decimal_to_fractional(price: f64) -> Option<(i64, i64)> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    if price <= 1.0 {
        return Some((0, 1));
    }
    let target = price - 1.0;

    // Smallest denominator wins among equally close fractions, so the result is reduced
    let mut best: Option<(i64, i64, f64)> = None;
    for den in 1..=MAX_DENOMINATOR {
        let num = ((target * den as f64).round() as i64).max(1);
        let error = (num as f64 / den as f64 - target).abs();
        match best {
            Some((_, _, best_error)) if error >= best_error - 1e-9 => {}
            _ => best = Some((num, den, error)),
        }
    }

    best.map(|(num, den, _)| {
        let g = gcd(num, den);
        (num / g, den / g)
    })
}

/// Convert decimal odds to American odds
/// Prices of 2.0 and above become positive (+150), shorter prices negative (-150).
/// There is no finite American price at 1.0 or below.
pub fn decimal_to_american(price: f64) -> Option<i32> {
    if !price.is_finite() || price <= 1.0 {
        return None;
    }
    if price >= 2.0 {
        Some(((price - 1.0) * 100.0).round() as i32)
    } else {
        Some(-(100.0 / (price - 1.0)).round() as i32)
    }
}

/// Convert American odds to decimal odds
/// Positive odds (+150) mean you win $150 on a $100 bet
/// Negative odds (-150) mean you need to bet $150 to win $100
pub fn american_to_decimal(odds: i32) -> f64 {
    if odds > 0 {
        1.0 + odds as f64 / 100.0
    } else if odds < 0 {
        1.0 + 100.0 / odds.unsigned_abs() as f64
    } else {
        0.0
    }
}

/// Implied probability of a decimal price
pub fn implied_probability(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then(|| 1.0 / price)
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs().max(1)
    } else {
        gcd(b, a % b)
    }
}
