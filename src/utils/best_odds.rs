use crate::models::{BestOddsResult, BestPrice, BookmakerProfile, Market, Outcome, Quote};
use crate::utils::odds_format::implied_probability;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Candidate for the best price of one outcome
struct Candidate<'a> {
    price: f64,
    rating: f64,
    bookmaker_id: &'a str,
}

impl Candidate<'_> {
    /// Higher price first, then higher-rated bookmaker, then smaller bookmaker id
    fn beats(&self, other: &Candidate<'_>) -> bool {
        match self.price.total_cmp(&other.price) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match self.rating.total_cmp(&other.rating) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => self.bookmaker_id < other.bookmaker_id,
            },
        }
    }
}

/// Find the best price per outcome across all quotes of a match.
///
/// Prices of 0 or below count as "not offered". Bookmakers without a profile
/// rank as rating 0 when breaking ties. The result does not depend on the
/// order of `quotes`.
pub fn best_odds(
    quotes: &[Quote],
    bookmakers: &HashMap<String, BookmakerProfile>,
    market: Market,
) -> BestOddsResult {
    let mut result = BestOddsResult {
        market,
        home: None,
        draw: None,
        away: None,
    };

    for outcome in market.outcomes() {
        let best = best_for_outcome(quotes, bookmakers, *outcome);
        match outcome {
            Outcome::Home => result.home = Some(best),
            Outcome::Draw => result.draw = Some(best),
            Outcome::Away => result.away = Some(best),
        }
    }

    result
}

fn best_for_outcome(
    quotes: &[Quote],
    bookmakers: &HashMap<String, BookmakerProfile>,
    outcome: Outcome,
) -> BestPrice {
    let mut best: Option<Candidate> = None;

    for quote in quotes {
        let Some(price) = quote.price(outcome) else {
            continue;
        };
        let candidate = Candidate {
            price,
            rating: bookmakers
                .get(&quote.bookmaker_id)
                .map(BookmakerProfile::normalized_rating)
                .unwrap_or(0.0),
            bookmaker_id: &quote.bookmaker_id,
        };
        if best.as_ref().map_or(true, |current| candidate.beats(current)) {
            best = Some(candidate);
        }
    }

    match best {
        Some(candidate) => BestPrice::Available {
            price: candidate.price,
            bookmaker_id: candidate.bookmaker_id.to_string(),
        },
        None => BestPrice::Unavailable,
    }
}

impl BestOddsResult {
    /// Bookmaker margin when backing every outcome at its best price.
    ///
    /// Needs an `all` market with home and away available. When nobody quotes
    /// a draw the event is treated as two-way. A negative value is a sure bet.
    pub fn book_margin(&self) -> Option<f64> {
        if self.market != Market::All {
            return None;
        }
        let home = self.home.as_ref()?.price()?;
        let away = self.away.as_ref()?.price()?;

        let mut total = implied_probability(home)? + implied_probability(away)?;
        if let Some(draw) = self.draw.as_ref().and_then(BestPrice::price) {
            total += implied_probability(draw)?;
        }

        Some(total - 1.0)
    }

    /// Profit percentage of a sure bet across bookmakers, if there is one
    pub fn sure_bet(&self) -> Option<f64> {
        let margin = self.book_margin()?;
        (margin < 0.0).then(|| (1.0 / (1.0 + margin) - 1.0) * 100.0)
    }
}
