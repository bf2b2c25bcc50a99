use crate::models::{Match, Outcome};
use crate::utils::ranking::Rankable;
use serde::{Deserialize, Serialize};

/// Typed filter set for operators and quote rows. All predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Inclusive lower bound on the bookmaker rating, 0 lets everything through
    #[serde(default)]
    pub min_rating: f64,
    #[serde(default)]
    pub bonus_type: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    /// The outcome must be offered (price above 0)
    #[serde(default)]
    pub market: Option<Outcome>,
    #[serde(default)]
    pub live_betting: Option<bool>,
    #[serde(default)]
    pub featured: Option<bool>,
}

impl FilterSpec {
    pub fn matches<T: Rankable + ?Sized>(&self, item: &T) -> bool {
        if item.rating() < self.min_rating {
            return false;
        }

        if let Some(bonus_type) = &self.bonus_type {
            if item.bonus_type() != Some(bonus_type.as_str()) {
                return false;
            }
        }

        if let Some(license) = &self.license {
            if item.license() != Some(license.as_str()) {
                return false;
            }
        }

        if let Some(outcome) = self.market {
            if !item.offers(outcome) {
                return false;
            }
        }

        if let Some(live_betting) = self.live_betting {
            if item.live_betting() != live_betting {
                return false;
            }
        }

        if let Some(featured) = self.featured {
            if item.featured() != featured {
                return false;
            }
        }

        true
    }
}

/// Filter values as they arrive from a query string or form.
/// Unrecognised keys are dropped by serde; malformed values become "no filter".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub min_rating: Option<String>,
    pub bonus_type: Option<String>,
    pub license: Option<String>,
    pub market: Option<String>,
    pub live_betting: Option<String>,
    pub featured: Option<String>,
}

impl FilterParams {
    pub fn into_spec(self) -> FilterSpec {
        FilterSpec {
            min_rating: parse_rating(self.min_rating.as_deref()),
            bonus_type: non_empty(self.bonus_type),
            license: non_empty(self.license),
            market: self
                .market
                .as_deref()
                .filter(|v| !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("all"))
                .and_then(|v| {
                    let outcome = Outcome::parse(v);
                    if outcome.is_none() {
                        tracing::debug!(market = v, "ignoring unknown market filter");
                    }
                    outcome
                }),
            live_betting: parse_flag(self.live_betting.as_deref()),
            featured: parse_flag(self.featured.as_deref()),
        }
    }
}

/// Match listing filter, used by the matches endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchQuery {
    pub sport: Option<String>,
    pub league: Option<String>,
    pub live: Option<bool>,
    pub featured: Option<bool>,
}

impl MatchQuery {
    pub fn matches(&self, game: &Match) -> bool {
        if let Some(sport) = &self.sport {
            if !game.sport.eq_ignore_ascii_case(sport) {
                return false;
            }
        }

        if let Some(league) = &self.league {
            if !game.league.eq_ignore_ascii_case(league) {
                return false;
            }
        }

        if let Some(live) = self.live {
            if game.is_live != live {
                return false;
            }
        }

        if let Some(featured) = self.featured {
            if game.is_featured != featured {
                return false;
            }
        }

        true
    }

    /// Filter and order by kickoff, earliest first
    pub fn apply(&self, matches: Vec<Match>) -> Vec<Match> {
        let mut selected: Vec<Match> = matches.into_iter().filter(|m| self.matches(m)).collect();
        selected.sort_by(|a, b| {
            a.kickoff
                .cmp(&b.kickoff)
                .then_with(|| a.match_id.cmp(&b.match_id))
        });
        selected
    }
}

/// Raw match listing parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchParams {
    pub sport: Option<String>,
    pub league: Option<String>,
    pub live: Option<String>,
    pub featured: Option<String>,
}

impl MatchParams {
    pub fn into_query(self) -> MatchQuery {
        MatchQuery {
            sport: non_empty(self.sport),
            league: non_empty(self.league),
            live: parse_flag(self.live.as_deref()),
            featured: parse_flag(self.featured.as_deref()),
        }
    }
}

/// Non-numeric or negative ratings mean "no minimum"
pub fn parse_rating(value: Option<&str>) -> f64 {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => 0.0,
        Some(raw) => match raw.parse::<f64>() {
            Ok(rating) if rating.is_finite() && rating > 0.0 => rating,
            Ok(_) => 0.0,
            Err(_) => {
                tracing::debug!(min_rating = raw, "non-numeric rating filter, ignoring");
                0.0
            }
        },
    }
}

/// Anything other than a recognised yes/no value means "don't filter"
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        other => {
            tracing::debug!(flag = other, "unrecognised boolean filter, ignoring");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
