use crate::error::AggregatorError;
use crate::models::{BookmakerProfile, Outcome, Quote};
use crate::utils::filters::FilterSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Anything that can be sorted and filtered for display.
///
/// Defaults describe an item that carries no such attribute: rating 0, no
/// bonus, no prices, no flags.
pub trait Rankable {
    /// Identifier used as the final tie-break
    fn stable_id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn rating(&self) -> f64 {
        0.0
    }

    fn bonus_weight(&self) -> usize {
        0
    }

    fn max_price(&self) -> f64 {
        0.0
    }

    fn min_price(&self) -> f64 {
        0.0
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn bonus_type(&self) -> Option<&str> {
        None
    }

    fn license(&self) -> Option<&str> {
        None
    }

    fn offers(&self, _outcome: Outcome) -> bool {
        false
    }

    fn live_betting(&self) -> bool {
        false
    }

    fn featured(&self) -> bool {
        false
    }
}

impl Rankable for BookmakerProfile {
    fn stable_id(&self) -> &str {
        &self.bookmaker_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn rating(&self) -> f64 {
        self.normalized_rating()
    }

    fn bonus_weight(&self) -> usize {
        BookmakerProfile::bonus_weight(self)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn bonus_type(&self) -> Option<&str> {
        self.bonus_type.as_deref()
    }

    fn license(&self) -> Option<&str> {
        self.license.as_deref()
    }

    fn live_betting(&self) -> bool {
        self.features.live_betting
    }

    fn featured(&self) -> bool {
        self.featured
    }
}

/// A current quote joined with the profile of the bookmaker offering it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRow {
    #[serde(flatten)]
    pub quote: Quote,
    pub bookmaker: Option<BookmakerProfile>,
}

impl QuoteRow {
    pub fn new(quote: Quote, bookmaker: Option<BookmakerProfile>) -> Self {
        Self { quote, bookmaker }
    }
}

impl Rankable for QuoteRow {
    fn stable_id(&self) -> &str {
        &self.quote.quote_id
    }

    fn display_name(&self) -> &str {
        self.bookmaker
            .as_ref()
            .map(|b| b.display_name.as_str())
            .unwrap_or(self.quote.bookmaker_id.as_str())
    }

    fn rating(&self) -> f64 {
        self.bookmaker
            .as_ref()
            .map(BookmakerProfile::normalized_rating)
            .unwrap_or(0.0)
    }

    fn bonus_weight(&self) -> usize {
        self.bookmaker
            .as_ref()
            .map(BookmakerProfile::bonus_weight)
            .unwrap_or(0)
    }

    fn max_price(&self) -> f64 {
        self.quote.max_price()
    }

    fn min_price(&self) -> f64 {
        self.quote.min_price()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        Some(self.quote.last_updated)
    }

    fn bonus_type(&self) -> Option<&str> {
        self.bookmaker.as_ref()?.bonus_type.as_deref()
    }

    fn license(&self) -> Option<&str> {
        self.bookmaker.as_ref()?.license.as_deref()
    }

    fn offers(&self, outcome: Outcome) -> bool {
        self.quote.offers(outcome)
    }

    fn live_betting(&self) -> bool {
        self.bookmaker
            .as_ref()
            .map(|b| b.features.live_betting)
            .unwrap_or(false)
    }

    fn featured(&self) -> bool {
        self.bookmaker.as_ref().map(|b| b.featured).unwrap_or(false)
    }
}

/// Display orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Rating, highest first
    #[default]
    Rating,
    /// Length of the bonus description, longest first
    Bonus,
    /// Display name A-Z, ignoring case
    Name,
    /// Highest offered price first
    OddsHigh,
    /// Lowest offered price first; quotes offering nothing count as 0
    OddsLow,
    /// Most recently created (or updated, for quotes) first
    Newest,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::Bonus => "bonus",
            SortKey::Name => "name",
            SortKey::OddsHigh => "odds_high",
            SortKey::OddsLow => "odds_low",
            SortKey::Newest => "newest",
        }
    }

    /// Unknown keys sort by rating
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::debug!(sort = value, "unknown sort key, using rating");
            SortKey::Rating
        })
    }
}

impl FromStr for SortKey {
    type Err = AggregatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rating" => Ok(SortKey::Rating),
            "bonus" => Ok(SortKey::Bonus),
            "name" => Ok(SortKey::Name),
            "odds_high" => Ok(SortKey::OddsHigh),
            "odds_low" => Ok(SortKey::OddsLow),
            "newest" => Ok(SortKey::Newest),
            _ => Err(AggregatorError::InvalidInput {
                field: "sort",
                value: value.to_string(),
            }),
        }
    }
}

/// Filter then sort. Equal primary keys fall back to the stable id, so the
/// output order never depends on the input order.
pub fn rank<T, I>(items: I, sort_key: SortKey, filters: &FilterSpec) -> Vec<T>
where
    T: Rankable,
    I: IntoIterator<Item = T>,
{
    let mut ranked: Vec<T> = items
        .into_iter()
        .filter(|item| filters.matches(item))
        .collect();
    ranked.sort_by(|a, b| compare(a, b, sort_key));
    ranked
}

pub fn compare<T: Rankable + ?Sized>(a: &T, b: &T, sort_key: SortKey) -> Ordering {
    let primary = match sort_key {
        SortKey::Rating => b.rating().total_cmp(&a.rating()),
        SortKey::Bonus => b.bonus_weight().cmp(&a.bonus_weight()),
        SortKey::Name => a
            .display_name()
            .to_lowercase()
            .cmp(&b.display_name().to_lowercase()),
        SortKey::OddsHigh => b.max_price().total_cmp(&a.max_price()),
        SortKey::OddsLow => a.min_price().total_cmp(&b.min_price()),
        // None < Some, so items without a timestamp end up last
        SortKey::Newest => b.created_at().cmp(&a.created_at()),
    };

    primary.then_with(|| a.stable_id().cmp(b.stable_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::pagination::paginate;
    use chrono::{Duration, TimeZone};

    fn book(id: &str, name: &str, rating: f64, bonus: Option<&str>) -> BookmakerProfile {
        let mut profile = BookmakerProfile::new(id, name);
        profile.rating = rating;
        profile.bonus_description = bonus.map(str::to_string);
        profile
    }

    fn row(id: &str, home: f64, draw: f64, away: f64, minutes: i64) -> QuoteRow {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap();
        QuoteRow::new(
            Quote {
                quote_id: id.to_string(),
                match_id: "m1".to_string(),
                bookmaker_id: format!("bk-{}", id),
                price_home: home,
                price_draw: draw,
                price_away: away,
                last_updated: base + Duration::minutes(minutes),
            },
            None,
        )
    }

    fn ids<T: Rankable>(items: &[T]) -> Vec<String> {
        items.iter().map(|i| i.stable_id().to_string()).collect()
    }

    fn books() -> Vec<BookmakerProfile> {
        vec![
            book("c", "charlie", 4.5, Some("Bet 10 get 30")),
            book("a", "Alpha", 4.8, None),
            book("b", "bravo", 4.5, Some("100% up to 200")),
            book("d", "Delta", 3.0, Some("Free bet")),
        ]
    }

    #[test]
    fn test_rank_by_rating_breaks_ties_by_id() {
        let ranked = rank(books(), SortKey::Rating, &FilterSpec::default());
        assert_eq!(ids(&ranked), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_rank_by_bonus_length() {
        let ranked = rank(books(), SortKey::Bonus, &FilterSpec::default());
        // "100% up to 200" and "Bet 10 get 30" are 14 and 13 chars
        assert_eq!(ids(&ranked), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn test_rank_by_name_ignores_case() {
        let ranked = rank(books(), SortKey::Name, &FilterSpec::default());
        assert_eq!(ids(&ranked), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unknown_sort_key_behaves_like_rating() {
        let key = SortKey::parse_lenient("popularity");
        assert_eq!(key, SortKey::Rating);
        assert_eq!(
            rank(books(), key, &FilterSpec::default()),
            rank(books(), SortKey::Rating, &FilterSpec::default())
        );
        assert!(matches!(
            "popularity".parse::<SortKey>(),
            Err(AggregatorError::InvalidInput { field: "sort", .. })
        ));
        assert_eq!("ODDS_HIGH".parse::<SortKey>().unwrap(), SortKey::OddsHigh);
    }

    #[test]
    fn test_rank_quotes_by_odds() {
        let rows = vec![
            row("q1", 2.1, 3.2, 3.4, 0),
            row("q2", 1.8, 3.6, 4.5, 5),
            row("q3", 0.0, 0.0, 0.0, 10),
            row("q4", 1.8, 0.0, 2.9, 15),
        ];

        let high = rank(rows.clone(), SortKey::OddsHigh, &FilterSpec::default());
        assert_eq!(ids(&high), vec!["q2", "q1", "q4", "q3"]);

        // q3 offers nothing, its min price is 0 and it sorts first
        let low = rank(rows.clone(), SortKey::OddsLow, &FilterSpec::default());
        assert_eq!(ids(&low), vec!["q3", "q2", "q4", "q1"]);

        let newest = rank(rows, SortKey::Newest, &FilterSpec::default());
        assert_eq!(ids(&newest), vec!["q4", "q3", "q2", "q1"]);
    }

    #[test]
    fn test_rank_applies_market_filter() {
        let rows = vec![row("q1", 2.1, 0.0, 3.4, 0), row("q2", 1.8, 3.6, 4.5, 5)];
        let filters = FilterSpec {
            market: Some(Outcome::Draw),
            ..Default::default()
        };
        assert_eq!(ids(&rank(rows, SortKey::Rating, &filters)), vec!["q2"]);
    }

    #[test]
    fn test_newest_puts_undated_profiles_last() {
        let mut dated = book("z", "Zulu", 1.0, None);
        dated.created_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let undated = book("a", "Alpha", 5.0, None);

        let ranked = rank(vec![undated, dated], SortKey::Newest, &FilterSpec::default());
        assert_eq!(ids(&ranked), vec!["z", "a"]);
    }

    #[test]
    fn test_quote_row_uses_bookmaker_profile() {
        let mut profile = book("bk-q1", "Bookie", 4.26, Some("Welcome"));
        profile.features.live_betting = true;
        let joined = QuoteRow::new(row("q1", 2.0, 3.0, 4.0, 0).quote, Some(profile));

        assert_eq!(joined.display_name(), "Bookie");
        assert_eq!(joined.rating(), 4.3);
        assert_eq!(joined.bonus_weight(), 7);
        assert!(joined.live_betting());

        let bare = row("q2", 2.0, 3.0, 4.0, 0);
        assert_eq!(bare.display_name(), "bk-q2");
        assert_eq!(bare.rating(), 0.0);
    }

    #[test]
    fn test_rank_is_order_independent() {
        let mut shuffled = books();
        shuffled.reverse();
        for key in [
            SortKey::Rating,
            SortKey::Bonus,
            SortKey::Name,
            SortKey::Newest,
        ] {
            assert_eq!(
                ids(&rank(books(), key, &FilterSpec::default())),
                ids(&rank(shuffled.clone(), key, &FilterSpec::default()))
            );
        }
    }

    fn tied_rows() -> Vec<QuoteRow> {
        vec![
            row("q3", 2.0, 3.0, 4.0, 0),
            row("q1", 2.0, 3.0, 4.0, 0),
            row("q5", 1.5, 3.0, 5.0, 0),
            row("q2", 2.0, 3.0, 4.0, 0),
            row("q4", 2.0, 3.0, 4.0, 0),
        ]
    }

    #[test]
    fn test_odds_sorts_are_order_independent() {
        let base = tied_rows();
        let mut reversed = base.clone();
        reversed.reverse();
        let mut rotated = base.clone();
        rotated.rotate_left(2);

        for (key, expected) in [
            (SortKey::OddsHigh, vec!["q5", "q1", "q2", "q3", "q4"]),
            (SortKey::OddsLow, vec!["q5", "q1", "q2", "q3", "q4"]),
        ] {
            for input in [&base, &reversed, &rotated] {
                assert_eq!(
                    ids(&rank(input.clone(), key, &FilterSpec::default())),
                    expected
                );
            }
        }
    }

    #[test]
    fn test_pages_of_ranked_rows_rebuild_the_ranking() {
        let mut rows = tied_rows();
        rows.push(row("q6", 2.4, 0.0, 2.9, 20));
        rows.push(row("q7", 0.0, 0.0, 0.0, 30));

        for key in [SortKey::OddsHigh, SortKey::OddsLow, SortKey::Newest] {
            let ranked = rank(rows.clone(), key, &FilterSpec::default());
            for per_page in 1..=8 {
                let mut rebuilt = Vec::new();
                let mut page = 1;
                loop {
                    let window = paginate(ranked.clone(), page, per_page);
                    assert_eq!(window.total, ranked.len());
                    rebuilt.extend(window.items);
                    if !window.has_more {
                        break;
                    }
                    page += 1;
                }
                assert_eq!(ids(&rebuilt), ids(&ranked), "{:?} per_page {}", key, per_page);
            }
        }
    }
}
