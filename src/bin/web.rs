use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use odds_compare::aggregator::{ComparisonRequest, OddsAggregator, OperatorRequest};
use odds_compare::config::Settings;
use odds_compare::filters::{FilterParams, MatchParams};
use odds_compare::odds_format::{format_price, OddsFormat};
use odds_compare::pagination::parse_page_number;
use odds_compare::ranking::{Rankable, SortKey};
use odds_compare::live::LiveOddsUpdate;
use odds_compare::repository::{SharedStore, SnapshotStore};
use odds_compare::{load_snapshot, spawn_refresh, AggregatorError, BestOddsResult, Market, Outcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// One price cell: the formatted price and who offers it
struct PriceCell {
    price: String,
    bookmaker: String,
}

struct MatchRowView {
    match_id: String,
    home_team: String,
    away_team: String,
    league: String,
    kickoff: String,
    is_live: bool,
    best: Vec<PriceCell>,
    bookmaker_count: usize,
}

struct QuoteRowView {
    bookmaker: String,
    rating: String,
    prices: Vec<PriceCell>,
    updated: String,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    title: String,
    format: String,
    matches: Vec<MatchRowView>,
    loaded_at: String,
    page: usize,
    has_more: bool,
    /// Query string, without `page`, carried by the pager links
    pager_query: String,
}

#[derive(Template)]
#[template(path = "match.html")]
struct MatchTemplate {
    title: String,
    format: String,
    heading: String,
    kickoff: String,
    best: Vec<PriceCell>,
    /// Empty when there is no sure bet
    sure_bet: String,
    rows: Vec<QuoteRowView>,
    /// Query string, without `sort` and `page`, carried by the sort links
    filter_query: String,
    /// Query string, without `page`, carried by the pager links
    pager_query: String,
    page: usize,
    has_more: bool,
}

#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {
    title: String,
    message: String,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// JSON envelope shared by every API endpoint
#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn json_ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        data,
    })
    .into_response()
}

fn json_error(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(Envelope {
            success: false,
            data: serde_json::json!({ "message": message }),
        }),
    )
        .into_response()
}

fn aggregator_error(err: AggregatorError) -> Response {
    if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, err.to_string())
    } else {
        tracing::error!(error = %err, "request failed");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

fn not_loaded() -> Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Data not loaded yet".to_string(),
    )
}

/// Query string accepted by the listing endpoints
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    sort: Option<String>,
    market: Option<String>,
    format: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    /// Comma-separated bookmaker ids
    operators: Option<String>,
    #[serde(flatten)]
    filters: FilterParams,
}

impl ListParams {
    fn sort(&self) -> SortKey {
        self.sort
            .as_deref()
            .map(SortKey::parse_lenient)
            .unwrap_or_default()
    }

    fn format(&self, settings: &Settings) -> OddsFormat {
        self.format
            .as_deref()
            .map(OddsFormat::parse_lenient)
            .unwrap_or(settings.odds_format)
    }

    fn page(&self) -> usize {
        parse_page_number(self.page.as_deref(), 1)
    }

    fn per_page(&self, settings: &Settings) -> usize {
        parse_page_number(self.per_page.as_deref(), settings.default_per_page)
    }

    fn comparison_request(&self, settings: &Settings) -> ComparisonRequest {
        ComparisonRequest {
            operator_ids: self.operators.as_deref().map(split_ids),
            sort: self.sort(),
            filters: self.filters.clone().into_spec(),
            market: self
                .market
                .as_deref()
                .map(Market::parse_lenient)
                .unwrap_or_default(),
            page: self.page(),
            per_page: self.per_page(settings),
        }
    }

    fn operator_request(&self, settings: &Settings) -> OperatorRequest {
        OperatorRequest {
            sort: self.sort(),
            filters: self.filters.clone().into_spec(),
            page: self.page(),
            per_page: self.per_page(settings),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MatchListParams {
    format: Option<String>,
    page: Option<String>,
    per_page: Option<String>,
    #[serde(flatten)]
    query: MatchParams,
}

/// `/api/live` payload. `loaded_at` is a good `since` for the next poll.
#[derive(Serialize)]
struct LiveResponse {
    loaded_at: DateTime<Utc>,
    updates: Vec<LiveOddsUpdate>,
}

#[derive(Debug, Default, Deserialize)]
struct LiveParams {
    ids: Option<String>,
    since: Option<String>,
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Encode the given parameters as a query string, skipping empty values
fn query_string(pairs: &[(&str, Option<&str>)]) -> String {
    let Ok(mut url) = reqwest::Url::parse("http://localhost/") else {
        return String::new();
    };
    url.query_pairs_mut().extend_pairs(
        pairs
            .iter()
            .filter_map(|(key, value)| (*value).filter(|v| !v.trim().is_empty()).map(|v| (*key, v))),
    );
    url.query().unwrap_or_default().to_string()
}

impl ListParams {
    /// Everything but `sort` and `page`
    fn filter_pairs<'a>(&'a self, format: &'a str) -> Vec<(&'static str, Option<&'a str>)> {
        vec![
            ("format", Some(format)),
            ("market", self.market.as_deref()),
            ("operators", self.operators.as_deref()),
            ("per_page", self.per_page.as_deref()),
            ("min_rating", self.filters.min_rating.as_deref()),
            ("bonus_type", self.filters.bonus_type.as_deref()),
            ("license", self.filters.license.as_deref()),
            ("live_betting", self.filters.live_betting.as_deref()),
            ("featured", self.filters.featured.as_deref()),
        ]
    }
}

impl MatchListParams {
    fn pager_pairs<'a>(&'a self, format: &'a str) -> Vec<(&'static str, Option<&'a str>)> {
        vec![
            ("format", Some(format)),
            ("per_page", self.per_page.as_deref()),
            ("sport", self.query.sport.as_deref()),
            ("league", self.query.league.as_deref()),
            ("live", self.query.live.as_deref()),
            ("featured", self.query.featured.as_deref()),
        ]
    }
}

fn price_cells(best: &BestOddsResult, format: OddsFormat) -> Vec<PriceCell> {
    Outcome::ALL
        .iter()
        .map(|outcome| {
            let best = best.get(*outcome);
            PriceCell {
                price: format_price(best.and_then(|b| b.price()), format),
                bookmaker: best
                    .and_then(|b| b.bookmaker_id())
                    .unwrap_or("-")
                    .to_string(),
            }
        })
        .collect()
}

fn format_name(format: OddsFormat) -> String {
    match format {
        OddsFormat::Decimal => "decimal",
        OddsFormat::Fractional => "fractional",
        OddsFormat::American => "american",
    }
    .to_string()
}

#[derive(Clone)]
struct AppState {
    store: SharedStore,
    settings: Arc<Settings>,
}

async fn home(State(state): State<AppState>, Query(params): Query<MatchListParams>) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Data not loaded yet").into_response();
    };

    let format = params
        .format
        .as_deref()
        .map(OddsFormat::parse_lenient)
        .unwrap_or(state.settings.odds_format);
    let page = parse_page_number(params.page.as_deref(), 1);
    let per_page = parse_page_number(params.per_page.as_deref(), state.settings.default_per_page);

    let format_label = format_name(format);
    let pager_query = query_string(&params.pager_pairs(&format_label));
    let aggregator = OddsAggregator::new(store);
    let listing = match aggregator.list_matches(&params.query.clone().into_query(), page, per_page) {
        Ok(listing) => listing,
        Err(err) => return aggregator_error(err),
    };

    let matches = listing
        .items
        .iter()
        .map(|summary| MatchRowView {
            match_id: summary.fixture.match_id.clone(),
            home_team: summary.fixture.home_team.clone(),
            away_team: summary.fixture.away_team.clone(),
            league: summary.fixture.league.clone(),
            kickoff: summary.fixture.kickoff.format("%Y-%m-%d %H:%M").to_string(),
            is_live: summary.fixture.is_live,
            best: price_cells(&summary.best, format),
            bookmaker_count: summary.bookmaker_count,
        })
        .collect();

    HtmlTemplate(HomeTemplate {
        title: "Odds comparison".to_string(),
        format: format_label,
        matches,
        loaded_at: store.loaded_at().format("%Y-%m-%d %H:%M UTC").to_string(),
        page: listing.page,
        has_more: listing.has_more,
        pager_query,
    })
    .into_response()
}

async fn match_page(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Data not loaded yet").into_response();
    };

    let format = params.format(&state.settings);
    let aggregator = OddsAggregator::new(store);
    let comparison =
        match aggregator.compare_match(&match_id, &params.comparison_request(&state.settings)) {
            Ok(comparison) => comparison,
            Err(err) if err.is_not_found() => {
                let page = HtmlTemplate(NotFoundTemplate {
                    title: "Not found".to_string(),
                    message: err.to_string(),
                });
                return (StatusCode::NOT_FOUND, page).into_response();
            }
            Err(err) => return aggregator_error(err),
        };

    let rows = comparison
        .quotes
        .items
        .iter()
        .map(|row| QuoteRowView {
            bookmaker: row.display_name().to_string(),
            rating: format!("{:.1}", row.rating()),
            prices: Outcome::ALL
                .iter()
                .map(|outcome| PriceCell {
                    price: format_price(row.quote.price(*outcome), format),
                    bookmaker: row.quote.bookmaker_id.clone(),
                })
                .collect(),
            updated: row.quote.last_updated.format("%H:%M").to_string(),
        })
        .collect();

    let format_label = format_name(format);
    let filter_pairs = params.filter_pairs(&format_label);
    let filter_query = query_string(&filter_pairs);
    let mut pager_pairs = filter_pairs;
    pager_pairs.push(("sort", Some(comparison.sort.as_str())));
    let pager_query = query_string(&pager_pairs);

    let fixture = &comparison.fixture;
    HtmlTemplate(MatchTemplate {
        title: format!("{} vs {}", fixture.home_team, fixture.away_team),
        format: format_label,
        heading: format!("{} vs {}", fixture.home_team, fixture.away_team),
        kickoff: fixture.kickoff.format("%Y-%m-%d %H:%M").to_string(),
        best: price_cells(&comparison.best, format),
        sure_bet: comparison
            .best
            .sure_bet()
            .map(|p| format!("{:.2}%", p))
            .unwrap_or_default(),
        rows,
        filter_query,
        pager_query,
        page: comparison.quotes.page,
        has_more: comparison.quotes.has_more,
    })
    .into_response()
}

async fn api_matches(State(state): State<AppState>, Query(params): Query<MatchListParams>) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return not_loaded();
    };

    let page = parse_page_number(params.page.as_deref(), 1);
    let per_page = parse_page_number(params.per_page.as_deref(), state.settings.default_per_page);

    match OddsAggregator::new(store).list_matches(&params.query.into_query(), page, per_page) {
        Ok(listing) => json_ok(listing),
        Err(err) => aggregator_error(err),
    }
}

async fn api_match_odds(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return not_loaded();
    };

    let request = params.comparison_request(&state.settings);
    match OddsAggregator::new(store).compare_match(&match_id, &request) {
        Ok(comparison) => json_ok(comparison),
        Err(err) => aggregator_error(err),
    }
}

async fn api_operators(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return not_loaded();
    };

    match OddsAggregator::new(store).rank_operators(&params.operator_request(&state.settings)) {
        Ok(page) => json_ok(page),
        Err(err) => aggregator_error(err),
    }
}

async fn api_live(State(state): State<AppState>, Query(params): Query<LiveParams>) -> Response {
    let guard = state.store.read().await;
    let Some(store) = guard.as_ref() else {
        return not_loaded();
    };

    let ids = params.ids.as_deref().map(split_ids).unwrap_or_default();
    let since = params.since.as_deref().and_then(|raw| {
        let parsed = raw.parse::<DateTime<Utc>>().ok();
        if parsed.is_none() {
            tracing::debug!(since = raw, "unparseable since timestamp, sending all quotes");
        }
        parsed
    });

    match OddsAggregator::new(store).live_refresh(&ids, since) {
        Ok(updates) => json_ok(LiveResponse {
            loaded_at: store.loaded_at(),
            updates,
        }),
        Err(err) => aggregator_error(err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env()?;

    tracing::info!("Fetching odds snapshot...");

    // Fetch data on startup
    let store = match load_snapshot(&settings).await {
        Ok(snapshot) => {
            let store = SnapshotStore::new(snapshot);
            tracing::info!(
                matches = store.match_count(),
                bookmakers = store.bookmaker_count(),
                "Data loaded successfully"
            );
            Some(store)
        }
        Err(e) => {
            tracing::error!(error = ?e, "Error fetching data, server will start but pages may show errors");
            None
        }
    };

    let state = AppState {
        store: Arc::new(RwLock::new(store)),
        settings: Arc::new(settings.clone()),
    };

    // Keep /api/live fed with fresh quotes
    spawn_refresh(state.store.clone(), settings.clone());

    let app = Router::new()
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(home))
        .route("/matches/:id", get(match_page))
        .route("/api/matches", get(api_matches))
        .route("/api/matches/:id/odds", get(api_match_odds))
        .route("/api/operators", get(api_operators))
        .route("/api/live", get(api_live))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    tracing::info!("Starting web server at http://{}", settings.bind_addr);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_params(query: &str) -> ListParams {
        let uri: axum::http::Uri = format!("/matches/m1?{}", query).parse().unwrap();
        Query::<ListParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_query_string_skips_empty_values_and_encodes() {
        let query = query_string(&[
            ("format", Some("decimal")),
            ("license", Some("Malta GA")),
            ("market", None),
            ("bonus_type", Some(" ")),
        ]);
        assert_eq!(query, "format=decimal&license=Malta+GA");
    }

    #[test]
    fn test_match_page_links_keep_filters() {
        let params = list_params(
            "sort=odds_high&market=home&operators=1,3&min_rating=4&live_betting=yes&per_page=5&page=2",
        );
        let query = query_string(&params.filter_pairs("fractional"));

        assert_eq!(
            query,
            "format=fractional&market=home&operators=1%2C3&per_page=5&min_rating=4&live_betting=yes"
        );
        assert!(!query.contains("page=2"));
        assert!(!query.contains("sort="));
    }

    #[test]
    fn test_home_pager_keeps_match_filters() {
        let uri: axum::http::Uri = "/?sport=football&live=1&page=3".parse().unwrap();
        let params = Query::<MatchListParams>::try_from_uri(&uri).unwrap().0;
        assert_eq!(
            query_string(&params.pager_pairs("american")),
            "format=american&sport=football&live=1"
        );
    }
}
