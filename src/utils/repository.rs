use crate::error::{AggregatorError, Result};
use crate::models::{BookmakerProfile, Match, Quote, Snapshot};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot shared between request handlers and the refresh task.
/// `None` until the first load succeeds.
pub type SharedStore = Arc<RwLock<Option<SnapshotStore>>>;

/// Read-only access to the content store.
///
/// Implementations must give a consistent view of a match's quotes within a
/// single `get_quotes` call. Provider failures go out as
/// `AggregatorError::Provider`.
pub trait QuoteRepository {
    fn get_match(&self, match_id: &str) -> Result<Match>;

    /// Current quotes for a match, one per bookmaker.
    ///
    /// Fails with `MatchNotFound` for an unknown match so callers can tell
    /// "no such match" apart from "no odds yet". When `operator_ids` is given
    /// only those bookmakers are returned; ids that match nothing are ignored.
    fn get_quotes(&self, match_id: &str, operator_ids: Option<&[String]>) -> Result<Vec<Quote>>;

    fn get_bookmaker(&self, bookmaker_id: &str) -> Result<BookmakerProfile>;

    fn list_bookmakers(&self) -> Result<Vec<BookmakerProfile>>;

    fn list_matches(&self) -> Result<Vec<Match>>;

    /// Bookmaker profiles keyed by id
    fn bookmaker_index(&self) -> Result<HashMap<String, BookmakerProfile>> {
        Ok(self
            .list_bookmakers()?
            .into_iter()
            .map(|b| (b.bookmaker_id.clone(), b))
            .collect())
    }
}

impl<R: QuoteRepository + ?Sized> QuoteRepository for &R {
    fn get_match(&self, match_id: &str) -> Result<Match> {
        (**self).get_match(match_id)
    }

    fn get_quotes(&self, match_id: &str, operator_ids: Option<&[String]>) -> Result<Vec<Quote>> {
        (**self).get_quotes(match_id, operator_ids)
    }

    fn get_bookmaker(&self, bookmaker_id: &str) -> Result<BookmakerProfile> {
        (**self).get_bookmaker(bookmaker_id)
    }

    fn list_bookmakers(&self) -> Result<Vec<BookmakerProfile>> {
        (**self).list_bookmakers()
    }

    fn list_matches(&self) -> Result<Vec<Match>> {
        (**self).list_matches()
    }

    fn bookmaker_index(&self) -> Result<HashMap<String, BookmakerProfile>> {
        (**self).bookmaker_index()
    }
}

/// In-memory repository over one immutable snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    matches: HashMap<String, Match>,
    bookmakers: HashMap<String, BookmakerProfile>,
    // match id -> bookmaker id -> current quote
    quotes: HashMap<String, BTreeMap<String, Quote>>,
    loaded_at: DateTime<Utc>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        let matches: HashMap<String, Match> = snapshot
            .matches
            .into_iter()
            .map(|m| (m.match_id.clone(), m))
            .collect();

        let bookmakers: HashMap<String, BookmakerProfile> = snapshot
            .bookmakers
            .into_iter()
            .map(|b| (b.bookmaker_id.clone(), b))
            .collect();

        let mut quotes: HashMap<String, BTreeMap<String, Quote>> = HashMap::new();
        let mut orphaned = 0usize;

        for quote in snapshot.quotes {
            if !matches.contains_key(&quote.match_id) {
                orphaned += 1;
                continue;
            }
            let per_match = quotes.entry(quote.match_id.clone()).or_default();
            let replace = per_match
                .get(&quote.bookmaker_id)
                .map_or(true, |existing| supersedes(&quote, existing));
            if replace {
                per_match.insert(quote.bookmaker_id.clone(), quote);
            }
        }

        if orphaned > 0 {
            tracing::warn!(orphaned, "dropped quotes referencing unknown matches");
        }

        tracing::info!(
            matches = matches.len(),
            bookmakers = bookmakers.len(),
            quotes = quotes.values().map(BTreeMap::len).sum::<usize>(),
            "snapshot loaded"
        );

        Self {
            matches,
            bookmakers,
            quotes,
            loaded_at: Utc::now(),
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn bookmaker_count(&self) -> usize {
        self.bookmakers.len()
    }
}

/// Index a fresh snapshot and swap it in. Readers keep the old store until the
/// write lock is taken, which only happens after indexing.
pub async fn replace_snapshot(shared: &RwLock<Option<SnapshotStore>>, snapshot: Snapshot) -> DateTime<Utc> {
    let store = SnapshotStore::new(snapshot);
    let loaded_at = store.loaded_at();
    *shared.write().await = Some(store);
    loaded_at
}

/// Newer update wins; on equal timestamps the greater quote id does
fn supersedes(candidate: &Quote, existing: &Quote) -> bool {
    candidate
        .last_updated
        .cmp(&existing.last_updated)
        .then_with(|| candidate.quote_id.cmp(&existing.quote_id))
        .is_gt()
}

impl QuoteRepository for SnapshotStore {
    fn get_match(&self, match_id: &str) -> Result<Match> {
        self.matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| AggregatorError::MatchNotFound(match_id.to_string()))
    }

    fn get_quotes(&self, match_id: &str, operator_ids: Option<&[String]>) -> Result<Vec<Quote>> {
        if !self.matches.contains_key(match_id) {
            return Err(AggregatorError::MatchNotFound(match_id.to_string()));
        }

        let Some(per_match) = self.quotes.get(match_id) else {
            return Ok(Vec::new());
        };

        Ok(per_match
            .values()
            .filter(|q| operator_ids.map_or(true, |ids| ids.contains(&q.bookmaker_id)))
            .cloned()
            .collect())
    }

    fn get_bookmaker(&self, bookmaker_id: &str) -> Result<BookmakerProfile> {
        self.bookmakers
            .get(bookmaker_id)
            .cloned()
            .ok_or_else(|| AggregatorError::BookmakerNotFound(bookmaker_id.to_string()))
    }

    fn list_bookmakers(&self) -> Result<Vec<BookmakerProfile>> {
        let mut bookmakers: Vec<BookmakerProfile> = self.bookmakers.values().cloned().collect();
        bookmakers.sort_by(|a, b| a.bookmaker_id.cmp(&b.bookmaker_id));
        Ok(bookmakers)
    }

    fn list_matches(&self) -> Result<Vec<Match>> {
        let mut matches: Vec<Match> = self.matches.values().cloned().collect();
        matches.sort_by(|a, b| a.match_id.cmp(&b.match_id));
        Ok(matches)
    }

    fn bookmaker_index(&self) -> Result<HashMap<String, BookmakerProfile>> {
        Ok(self.bookmakers.clone())
    }
}
