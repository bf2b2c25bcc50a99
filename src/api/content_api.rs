use crate::models::{BookmakerProfile, FeatureFlags, Match, Quote, Snapshot};
use crate::utils::odds_format::{american_to_decimal, OddsFormat};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Post meta arrives as strings, numbers or booleans depending on how it was saved
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MetaValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl MetaValue {
    fn as_f64(&self) -> f64 {
        match self {
            MetaValue::Number(n) => *n,
            MetaValue::Text(s) => s.trim().replace(',', ".").parse().unwrap_or(0.0),
            MetaValue::Bool(_) => 0.0,
        }
    }

    fn as_bool(&self) -> bool {
        match self {
            MetaValue::Bool(b) => *b,
            MetaValue::Number(n) => *n != 0.0,
            MetaValue::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
        }
    }

    fn into_id(self) -> String {
        match self {
            MetaValue::Number(n) => format!("{}", n),
            MetaValue::Text(s) => s,
            MetaValue::Bool(b) => b.to_string(),
        }
    }
}

fn meta_f64(value: &Option<MetaValue>) -> f64 {
    value.as_ref().map(MetaValue::as_f64).unwrap_or(0.0)
}

fn meta_bool(value: &Option<MetaValue>) -> bool {
    value.as_ref().map(MetaValue::as_bool).unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Match post from the content API
#[derive(Debug, Deserialize)]
struct ApiMatch {
    id: MetaValue,
    home_team: String,
    away_team: String,
    kickoff: DateTime<Utc>,
    #[serde(default)]
    sport: Option<String>,
    #[serde(default)]
    league: Option<String>,
    #[serde(default)]
    is_live: Option<MetaValue>,
    #[serde(default)]
    is_featured: Option<MetaValue>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<ApiMatch> for Match {
    fn from(api: ApiMatch) -> Self {
        Match {
            is_live: meta_bool(&api.is_live),
            is_featured: meta_bool(&api.is_featured),
            match_id: api.id.into_id(),
            home_team: api.home_team,
            away_team: api.away_team,
            kickoff: api.kickoff,
            sport: api.sport.unwrap_or_default(),
            league: api.league.unwrap_or_default(),
            created_at: api.created_at,
        }
    }
}

/// Operator post from the content API
#[derive(Debug, Deserialize)]
struct ApiOperator {
    id: MetaValue,
    title: String,
    #[serde(default)]
    rating: Option<MetaValue>,
    #[serde(default)]
    bonus: Option<String>,
    #[serde(default)]
    bonus_type: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    live_betting: Option<MetaValue>,
    #[serde(default)]
    cash_out: Option<MetaValue>,
    #[serde(default)]
    mobile_app: Option<MetaValue>,
    #[serde(default)]
    live_streaming: Option<MetaValue>,
    #[serde(default)]
    featured: Option<MetaValue>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<ApiOperator> for BookmakerProfile {
    fn from(api: ApiOperator) -> Self {
        BookmakerProfile {
            rating: meta_f64(&api.rating),
            features: FeatureFlags {
                live_betting: meta_bool(&api.live_betting),
                cash_out: meta_bool(&api.cash_out),
                mobile_app: meta_bool(&api.mobile_app),
                live_streaming: meta_bool(&api.live_streaming),
            },
            featured: meta_bool(&api.featured),
            bookmaker_id: api.id.into_id(),
            display_name: api.title,
            bonus_description: non_empty(api.bonus),
            bonus_type: non_empty(api.bonus_type),
            license: non_empty(api.license),
            created_at: api.created_at,
        }
    }
}

/// Odds row from the content API
#[derive(Debug, Deserialize)]
struct ApiOdds {
    id: MetaValue,
    match_id: MetaValue,
    operator_id: MetaValue,
    #[serde(default)]
    home: Option<MetaValue>,
    #[serde(default)]
    draw: Option<MetaValue>,
    #[serde(default)]
    away: Option<MetaValue>,
    /// Set to "american" when the prices were entered as moneylines
    #[serde(default)]
    format: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<ApiOdds> for Quote {
    fn from(api: ApiOdds) -> Self {
        let format = api
            .format
            .as_deref()
            .map(OddsFormat::parse_lenient)
            .unwrap_or_default();
        let price = |value: &Option<MetaValue>| match format {
            OddsFormat::American => american_to_decimal(meta_f64(value).round() as i32),
            _ => meta_f64(value),
        };

        Quote {
            price_home: price(&api.home),
            price_draw: price(&api.draw),
            price_away: price(&api.away),
            quote_id: api.id.into_id(),
            match_id: api.match_id.into_id(),
            bookmaker_id: api.operator_id.into_id(),
            last_updated: api.updated_at,
        }
    }
}

/// Read-only client for the site's content REST API
pub struct ContentApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ContentApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch_matches(&self) -> Result<Vec<Match>> {
        let matches: Vec<ApiMatch> = self.get_list("matches").await?;
        Ok(matches.into_iter().map(Match::from).collect())
    }

    pub async fn fetch_operators(&self) -> Result<Vec<BookmakerProfile>> {
        let operators: Vec<ApiOperator> = self.get_list("operators").await?;
        Ok(operators.into_iter().map(BookmakerProfile::from).collect())
    }

    pub async fn fetch_quotes(&self) -> Result<Vec<Quote>> {
        let odds: Vec<ApiOdds> = self.get_list("odds").await?;
        Ok(odds.into_iter().map(Quote::from).collect())
    }

    /// Fetch matches, operators and odds in one go
    pub async fn fetch_snapshot(&self) -> Result<Snapshot> {
        let (matches, bookmakers, quotes) = tokio::try_join!(
            self.fetch_matches(),
            self.fetch_operators(),
            self.fetch_quotes()
        )?;

        tracing::info!(
            matches = matches.len(),
            bookmakers = bookmakers.len(),
            quotes = quotes.len(),
            "fetched snapshot from content API"
        );

        Ok(Snapshot {
            matches,
            bookmakers,
            quotes,
        })
    }

    async fn get_list<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Content API returned error for {}: {}", endpoint, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", endpoint))
    }
}
