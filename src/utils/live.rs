use crate::models::{BestOddsResult, BookmakerProfile, Market, Match, Quote};
use crate::utils::best_odds::best_odds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Payload for one match in a live odds refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveOddsUpdate {
    pub match_id: String,
    pub is_live: bool,
    pub best: BestOddsResult,
    /// Quotes updated after the client's last refresh, ordered by bookmaker
    pub changed: Vec<Quote>,
    /// Most recent quote update for the match, if it has any quotes
    pub updated_at: Option<DateTime<Utc>>,
}

/// Shape the refresh payload for one match from its current quotes.
///
/// Best odds always cover every current quote; `changed` only lists quotes
/// strictly newer than `since`, or all of them when `since` is absent.
pub fn shape_update(
    fixture: &Match,
    quotes: &[Quote],
    bookmakers: &HashMap<String, BookmakerProfile>,
    since: Option<DateTime<Utc>>,
) -> LiveOddsUpdate {
    let mut changed: Vec<Quote> = quotes
        .iter()
        .filter(|q| since.map_or(true, |since| q.last_updated > since))
        .cloned()
        .collect();
    changed.sort_by(|a, b| {
        a.bookmaker_id
            .cmp(&b.bookmaker_id)
            .then_with(|| a.quote_id.cmp(&b.quote_id))
    });

    LiveOddsUpdate {
        match_id: fixture.match_id.clone(),
        is_live: fixture.is_live,
        best: best_odds(quotes, bookmakers, Market::All),
        changed,
        updated_at: quotes.iter().map(|q| q.last_updated).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BestPrice;
    use crate::utils::repository::tests::{at, fixture, profile, quote};

    #[test]
    fn test_changed_only_lists_newer_quotes() {
        let quotes = vec![
            quote("q1", "m1", "1", (2.0, 3.0, 4.0), 0),
            quote("q2", "m1", "2", (2.2, 3.1, 3.9), 5),
            quote("q3", "m1", "3", (1.9, 3.3, 4.1), 10),
        ];
        let books: HashMap<String, BookmakerProfile> = [profile("1", 4.0), profile("2", 4.0)]
            .into_iter()
            .map(|b| (b.bookmaker_id.clone(), b))
            .collect();

        let update = shape_update(&fixture("m1", 0), &quotes, &books, Some(at(5)));
        let changed: Vec<&str> = update.changed.iter().map(|q| q.quote_id.as_str()).collect();
        assert_eq!(changed, vec!["q3"]);
        assert_eq!(update.updated_at, Some(at(10)));

        // Best odds still see every quote
        assert_eq!(
            update.best.home,
            Some(BestPrice::Available {
                price: 2.2,
                bookmaker_id: "2".to_string()
            })
        );
        assert_eq!(update.best.away.as_ref().and_then(BestPrice::price), Some(4.1));
    }

    #[test]
    fn test_without_since_everything_changed() {
        let quotes = vec![
            quote("q2", "m1", "b", (2.2, 3.1, 3.9), 5),
            quote("q1", "m1", "a", (2.0, 3.0, 4.0), 0),
        ];
        let update = shape_update(&fixture("m1", 0), &quotes, &HashMap::new(), None);
        let changed: Vec<&str> = update.changed.iter().map(|q| q.bookmaker_id.as_str()).collect();
        assert_eq!(changed, vec!["a", "b"]);
    }

    #[test]
    fn test_no_quotes() {
        let update = shape_update(&fixture("m1", 0), &[], &HashMap::new(), None);
        assert!(update.changed.is_empty());
        assert_eq!(update.updated_at, None);
        assert_eq!(update.best.home, Some(BestPrice::Unavailable));
    }
}
