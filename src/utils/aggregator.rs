use crate::error::{AggregatorError, Result};
use crate::models::{BestOddsResult, BookmakerProfile, Market, Match, Quote};
use crate::utils::best_odds::best_odds;
use crate::utils::filters::{FilterSpec, MatchQuery};
use crate::utils::live::{shape_update, LiveOddsUpdate};
use crate::utils::pagination::{paginate, Page, DEFAULT_PER_PAGE};
use crate::utils::ranking::{rank, QuoteRow, SortKey};
use crate::utils::repository::QuoteRepository;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What to show in a match's odds comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRequest {
    /// Restrict to these bookmakers
    pub operator_ids: Option<Vec<String>>,
    pub sort: SortKey,
    pub filters: FilterSpec,
    pub market: Market,
    pub page: usize,
    pub per_page: usize,
}

impl Default for ComparisonRequest {
    fn default() -> Self {
        Self {
            operator_ids: None,
            sort: SortKey::default(),
            filters: FilterSpec::default(),
            market: Market::All,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// What to show in the operator (bookmaker) listing
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRequest {
    pub sort: SortKey,
    pub filters: FilterSpec,
    pub page: usize,
    pub per_page: usize,
}

impl Default for OperatorRequest {
    fn default() -> Self {
        Self {
            sort: SortKey::default(),
            filters: FilterSpec::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Odds comparison for a single match, ready for rendering
#[derive(Debug, Clone, Serialize)]
pub struct MatchComparison {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub sort: SortKey,
    /// Best prices among the quotes that passed the filters
    pub best: BestOddsResult,
    pub quotes: Page<QuoteRow>,
}

/// A match in a listing, with its headline best prices
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub best: BestOddsResult,
    pub bookmaker_count: usize,
}

/// Entry point used by the web and CLI front ends.
///
/// Every call works on what the repository returns for that call; nothing is
/// cached between calls.
pub struct OddsAggregator<R> {
    repo: R,
}

impl<R: QuoteRepository> OddsAggregator<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Rank a match's current quotes and pick the best price per outcome
    pub fn compare_match(&self, match_id: &str, request: &ComparisonRequest) -> Result<MatchComparison> {
        let fixture = self.repo.get_match(match_id)?;
        let quotes = self
            .repo
            .get_quotes(match_id, request.operator_ids.as_deref())?;
        let bookmakers = self.repo.bookmaker_index()?;

        let rows = quotes.into_iter().map(|quote| {
            let bookmaker = bookmakers.get(&quote.bookmaker_id).cloned();
            QuoteRow::new(quote, bookmaker)
        });
        let ranked = rank(rows, request.sort, &request.filters);

        let visible: Vec<Quote> = ranked.iter().map(|row| row.quote.clone()).collect();
        let best = best_odds(&visible, &bookmakers, request.market);

        tracing::debug!(
            match_id,
            quotes = ranked.len(),
            sort = request.sort.as_str(),
            "compared match odds"
        );

        Ok(MatchComparison {
            fixture,
            sort: request.sort,
            best,
            quotes: paginate(ranked, request.page, request.per_page),
        })
    }

    pub fn rank_operators(&self, request: &OperatorRequest) -> Result<Page<BookmakerProfile>> {
        let bookmakers = self.repo.list_bookmakers()?;
        let ranked = rank(bookmakers, request.sort, &request.filters);
        Ok(paginate(ranked, request.page, request.per_page))
    }

    /// Filtered match listing ordered by kickoff, best odds computed for the
    /// returned page only
    pub fn list_matches(
        &self,
        query: &MatchQuery,
        page: usize,
        per_page: usize,
    ) -> Result<Page<MatchSummary>> {
        let matches = query.apply(self.repo.list_matches()?);
        let bookmakers = self.repo.bookmaker_index()?;
        let Page {
            items,
            page,
            per_page,
            total,
            has_more,
        } = paginate(matches, page, per_page);

        let mut summaries = Vec::with_capacity(items.len());
        for fixture in items {
            let quotes = self.repo.get_quotes(&fixture.match_id, None)?;
            summaries.push(MatchSummary {
                best: best_odds(&quotes, &bookmakers, Market::All),
                bookmaker_count: quotes.len(),
                fixture,
            });
        }

        Ok(Page {
            items: summaries,
            page,
            per_page,
            total,
            has_more,
        })
    }

    /// Refresh payloads for the given matches. Unknown match ids are skipped.
    pub fn live_refresh(
        &self,
        match_ids: &[String],
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LiveOddsUpdate>> {
        let bookmakers = self.repo.bookmaker_index()?;
        let mut updates = Vec::with_capacity(match_ids.len());

        for match_id in match_ids {
            let fixture = match self.repo.get_match(match_id) {
                Ok(fixture) => fixture,
                Err(AggregatorError::MatchNotFound(_)) => {
                    tracing::warn!(match_id = match_id.as_str(), "live refresh for unknown match");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let quotes = self.repo.get_quotes(match_id, None)?;
            updates.push(shape_update(&fixture, &quotes, &bookmakers, since));
        }

        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BestPrice, Outcome};
    use crate::utils::repository::tests::{at, quote, sample_snapshot};
    use crate::utils::repository::{replace_snapshot, SharedStore, SnapshotStore};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn aggregator() -> OddsAggregator<SnapshotStore> {
        OddsAggregator::new(SnapshotStore::new(sample_snapshot()))
    }

    fn available(price: f64, bk: &str) -> Option<BestPrice> {
        Some(BestPrice::Available {
            price,
            bookmaker_id: bk.to_string(),
        })
    }

    #[test]
    fn test_compare_match_best_odds_and_order() {
        let comparison = aggregator()
            .compare_match("m1", &ComparisonRequest::default())
            .unwrap();

        assert_eq!(comparison.best.home, available(2.10, "2"));
        assert_eq!(comparison.best.draw, available(3.20, "1"));
        assert_eq!(comparison.best.away, available(3.50, "2"));

        let order: Vec<&str> = comparison
            .quotes
            .items
            .iter()
            .map(|row| row.quote.bookmaker_id.as_str())
            .collect();
        assert_eq!(order, vec!["2", "1", "3"]);
        assert_eq!(comparison.quotes.total, 3);
    }

    #[test]
    fn test_compare_unknown_match() {
        let err = aggregator()
            .compare_match("missing", &ComparisonRequest::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_best_odds_follow_filters() {
        let request = ComparisonRequest {
            filters: FilterSpec {
                min_rating: 4.6,
                ..Default::default()
            },
            ..Default::default()
        };
        let comparison = aggregator().compare_match("m1", &request).unwrap();
        assert_eq!(comparison.quotes.total, 1);
        assert_eq!(comparison.best.draw, available(3.10, "2"));
    }

    #[test]
    fn test_operator_restriction_and_market() {
        let request = ComparisonRequest {
            operator_ids: Some(vec!["1".to_string(), "3".to_string(), "zz".to_string()]),
            market: Market::Home,
            sort: SortKey::OddsHigh,
            ..Default::default()
        };
        let comparison = aggregator().compare_match("m1", &request).unwrap();
        assert_eq!(comparison.quotes.total, 2);
        assert_eq!(comparison.best.home, available(2.10, "1"));
        assert_eq!(comparison.best.get(Outcome::Away), None);
    }

    #[test]
    fn test_compare_paginates_after_ranking() {
        let request = ComparisonRequest {
            per_page: 2,
            page: 2,
            ..Default::default()
        };
        let comparison = aggregator().compare_match("m1", &request).unwrap();
        assert_eq!(comparison.quotes.items.len(), 1);
        assert_eq!(comparison.quotes.items[0].quote.bookmaker_id, "3");
        assert!(!comparison.quotes.has_more);
    }

    #[test]
    fn test_rank_operators() {
        let page = aggregator()
            .rank_operators(&OperatorRequest {
                filters: FilterSpec {
                    min_rating: 4.0,
                    ..Default::default()
                },
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|b| b.bookmaker_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn test_list_matches_with_summaries() {
        let page = aggregator()
            .list_matches(&MatchQuery::default(), 1, 2)
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.has_more);
        assert_eq!(page.items[0].fixture.match_id, "m1");
        assert_eq!(page.items[0].bookmaker_count, 3);
        assert_eq!(page.items[1].best.home, available(1.50, "1"));
    }

    #[test]
    fn test_live_refresh_skips_unknown_matches() {
        let ids = vec!["m1".to_string(), "ghost".to_string(), "m3".to_string()];
        let updates = aggregator().live_refresh(&ids, Some(at(5))).unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].match_id, "m1");
        assert_eq!(updates[0].changed.len(), 1);
        assert_eq!(updates[0].changed[0].quote_id, "q4");
        assert!(updates[1].changed.is_empty());
        assert_eq!(updates[1].best.home, Some(BestPrice::Unavailable));
    }

    #[tokio::test]
    async fn test_live_refresh_sees_quotes_from_replaced_snapshot() {
        let shared: SharedStore = Arc::new(RwLock::new(None));
        replace_snapshot(&shared, sample_snapshot()).await;
        let ids = vec!["m1".to_string()];

        {
            let guard = shared.read().await;
            let store = guard.as_ref().unwrap();
            let updates = OddsAggregator::new(store).live_refresh(&ids, Some(at(10))).unwrap();
            assert!(updates[0].changed.is_empty());
            assert_eq!(updates[0].best.home, available(2.10, "2"));
        }

        let mut snapshot = sample_snapshot();
        snapshot.quotes.push(quote("q7", "m1", "1", (2.60, 3.20, 3.40), 20));
        replace_snapshot(&shared, snapshot).await;

        let guard = shared.read().await;
        let store = guard.as_ref().unwrap();
        let updates = OddsAggregator::new(store).live_refresh(&ids, Some(at(10))).unwrap();
        assert_eq!(updates[0].changed.len(), 1);
        assert_eq!(updates[0].changed[0].quote_id, "q7");
        assert_eq!(updates[0].best.home, available(2.60, "1"));
        assert_eq!(updates[0].updated_at, Some(at(20)));
    }

    struct FailingStore;

    impl QuoteRepository for FailingStore {
        fn get_match(&self, _match_id: &str) -> Result<Match> {
            Err(anyhow::anyhow!("content store timed out").into())
        }

        fn get_quotes(&self, _match_id: &str, _ids: Option<&[String]>) -> Result<Vec<Quote>> {
            Err(anyhow::anyhow!("content store timed out").into())
        }

        fn get_bookmaker(&self, id: &str) -> Result<BookmakerProfile> {
            Err(AggregatorError::BookmakerNotFound(id.to_string()))
        }

        fn list_bookmakers(&self) -> Result<Vec<BookmakerProfile>> {
            Ok(Vec::new())
        }

        fn list_matches(&self) -> Result<Vec<Match>> {
            Ok(Vec::new())
        }

        fn bookmaker_index(&self) -> Result<HashMap<String, BookmakerProfile>> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn test_provider_errors_pass_through() {
        let aggregator = OddsAggregator::new(FailingStore);
        let err = aggregator
            .compare_match("m1", &ComparisonRequest::default())
            .unwrap_err();
        assert!(matches!(err, AggregatorError::Provider(_)));
        assert_eq!(err.to_string(), "content store timed out");

        let err = aggregator.live_refresh(&["m1".to_string()], None).unwrap_err();
        assert!(matches!(err, AggregatorError::Provider(_)));
    }
}
