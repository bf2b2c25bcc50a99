use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the three bettable outcomes of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    /// Parse "home", "draw" or "away" (also "1", "x", "2")
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "home" | "1" => Some(Outcome::Home),
            "draw" | "x" => Some(Outcome::Draw),
            "away" | "2" => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }
}

/// Which outcomes a best-odds lookup covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    All,
    Home,
    Draw,
    Away,
}

impl Market {
    /// Unknown market names fall back to `All`
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("all") {
            return Market::All;
        }
        match Outcome::parse(value) {
            Some(outcome) => Market::from(outcome),
            None => {
                tracing::debug!(market = value, "unknown market, using all");
                Market::All
            }
        }
    }

    pub fn outcomes(&self) -> &'static [Outcome] {
        match self {
            Market::All => &Outcome::ALL,
            Market::Home => &[Outcome::Home],
            Market::Draw => &[Outcome::Draw],
            Market::Away => &[Outcome::Away],
        }
    }
}

impl From<Outcome> for Market {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Home => Market::Home,
            Outcome::Draw => Market::Draw,
            Outcome::Away => Market::Away,
        }
    }
}

/// One bookmaker's current 1X2 pricing for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    pub match_id: String,
    pub bookmaker_id: String,
    // Decimal odds, 0 means the market is not offered
    #[serde(default)]
    pub price_home: f64,
    #[serde(default)]
    pub price_draw: f64,
    #[serde(default)]
    pub price_away: f64,
    pub last_updated: DateTime<Utc>,
}

impl Quote {
    /// The price for an outcome, or `None` when the market is not offered
    pub fn price(&self, outcome: Outcome) -> Option<f64> {
        let raw = match outcome {
            Outcome::Home => self.price_home,
            Outcome::Draw => self.price_draw,
            Outcome::Away => self.price_away,
        };
        (raw.is_finite() && raw > 0.0).then_some(raw)
    }

    pub fn offers(&self, outcome: Outcome) -> bool {
        self.price(outcome).is_some()
    }

    /// Highest offered price across home/draw/away, 0 if nothing is offered
    pub fn max_price(&self) -> f64 {
        Outcome::ALL
            .iter()
            .filter_map(|o| self.price(*o))
            .fold(0.0, f64::max)
    }

    /// Lowest offered price across home/draw/away.
    ///
    /// A quote with no offered market yields 0, which makes it indistinguishable
    /// from a real price of 0 and sorts it first under `odds_low`.
    pub fn min_price(&self) -> f64 {
        Outcome::ALL
            .iter()
            .filter_map(|o| self.price(*o))
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

/// Product features advertised by a bookmaker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub live_betting: bool,
    #[serde(default)]
    pub cash_out: bool,
    #[serde(default)]
    pub mobile_app: bool,
    #[serde(default)]
    pub live_streaming: bool,
}

/// An operator (bookmaker) as profiled on the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmakerProfile {
    pub bookmaker_id: String,
    pub display_name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub bonus_description: Option<String>,
    #[serde(default)]
    pub bonus_type: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub features: FeatureFlags,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BookmakerProfile {
    pub fn new(bookmaker_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            bookmaker_id: bookmaker_id.into(),
            display_name: display_name.into(),
            rating: 0.0,
            bonus_description: None,
            bonus_type: None,
            license: None,
            features: FeatureFlags::default(),
            featured: false,
            created_at: None,
        }
    }

    /// Rating clamped to 0.0..=5.0 with one decimal of precision
    pub fn normalized_rating(&self) -> f64 {
        if !self.rating.is_finite() {
            return 0.0;
        }
        (self.rating.clamp(0.0, 5.0) * 10.0).round() / 10.0
    }

    /// Character length of the bonus text, used as a rough bonus weight
    pub fn bonus_weight(&self) -> usize {
        self.bonus_description
            .as_deref()
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }
}

/// A scheduled fixture between two teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Best price for a single outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BestPrice {
    Available { price: f64, bookmaker_id: String },
    Unavailable,
}

impl BestPrice {
    pub fn price(&self) -> Option<f64> {
        match self {
            BestPrice::Available { price, .. } => Some(*price),
            BestPrice::Unavailable => None,
        }
    }

    pub fn bookmaker_id(&self) -> Option<&str> {
        match self {
            BestPrice::Available { bookmaker_id, .. } => Some(bookmaker_id),
            BestPrice::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, BestPrice::Available { .. })
    }
}

/// Best price per outcome across a set of quotes.
/// Outcomes outside the requested market are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestOddsResult {
    pub market: Market,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<BestPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draw: Option<BestPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away: Option<BestPrice>,
}

impl BestOddsResult {
    pub fn get(&self, outcome: Outcome) -> Option<&BestPrice> {
        match outcome {
            Outcome::Home => self.home.as_ref(),
            Outcome::Draw => self.draw.as_ref(),
            Outcome::Away => self.away.as_ref(),
        }
    }
}

/// Everything the content store knows at one point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub bookmakers: Vec<BookmakerProfile>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
}
