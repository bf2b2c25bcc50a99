use anyhow::{Context, Result};
use clap::Parser;
use odds_compare::aggregator::{ComparisonRequest, OddsAggregator, OperatorRequest};
use odds_compare::config::Settings;
use odds_compare::data::{save_operators_to_csv, save_quotes_to_csv};
use odds_compare::filters::FilterParams;
use odds_compare::odds_format::{format_price, OddsFormat};
use odds_compare::ranking::{Rankable, SortKey};
use odds_compare::repository::SnapshotStore;
use odds_compare::{load_snapshot, BestOddsResult, Market, Outcome};

/// Compare bookmaker odds from the command line
#[derive(Debug, Parser)]
#[command(name = "cli", version)]
struct Args {
    /// Use the cached snapshot instead of calling the content API
    #[arg(long)]
    use_cache: bool,

    /// Show the odds comparison for this match
    #[arg(long)]
    match_id: Option<String>,

    /// rating, bonus, name, odds_high, odds_low or newest
    #[arg(long, default_value = "rating")]
    sort: String,

    /// Reject unknown sort keys instead of falling back to rating
    #[arg(long)]
    strict: bool,

    /// all, home, draw or away
    #[arg(long, default_value = "all")]
    market: String,

    /// decimal, fractional or american (defaults to ODDS_FORMAT)
    #[arg(long)]
    format: Option<String>,

    #[arg(long)]
    min_rating: Option<String>,

    #[arg(long)]
    license: Option<String>,

    #[arg(long)]
    bonus_type: Option<String>,

    #[arg(long)]
    live_betting: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Rows per page (defaults to DEFAULT_PER_PAGE)
    #[arg(long)]
    per_page: Option<usize>,

    /// Write the listing to a CSV file under the cache directory
    #[arg(long)]
    csv: bool,
}

impl Args {
    fn per_page(&self, settings: &Settings) -> usize {
        self.per_page.unwrap_or(settings.default_per_page)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut settings = Settings::from_env()?;
    settings.use_cache |= args.use_cache;
    let per_page = args.per_page(&settings);

    let format = args
        .format
        .as_deref()
        .map(OddsFormat::parse_lenient)
        .unwrap_or(settings.odds_format);
    let sort = if args.strict {
        args.sort.parse::<SortKey>()?
    } else {
        SortKey::parse_lenient(&args.sort)
    };
    let filters = FilterParams {
        min_rating: args.min_rating.clone(),
        bonus_type: args.bonus_type.clone(),
        license: args.license.clone(),
        market: None,
        live_betting: args.live_betting.clone(),
        featured: None,
    }
    .into_spec();

    println!("Odds Comparison\n");

    let snapshot = load_snapshot(&settings)
        .await
        .context("Failed to load snapshot")?;
    let aggregator = OddsAggregator::new(SnapshotStore::new(snapshot));
    println!(
        "Loaded {} matches from {} bookmakers\n",
        aggregator.repository().match_count(),
        aggregator.repository().bookmaker_count()
    );

    match &args.match_id {
        Some(match_id) => {
            let request = ComparisonRequest {
                operator_ids: None,
                sort,
                filters,
                market: Market::parse_lenient(&args.market),
                page: args.page,
                per_page,
            };
            let comparison = aggregator.compare_match(match_id, &request)?;

            println!(
                "{} vs {} | {} | {}\n",
                comparison.fixture.home_team,
                comparison.fixture.away_team,
                comparison.fixture.league,
                comparison.fixture.kickoff.format("%Y-%m-%d %H:%M")
            );
            print_best(&comparison.best, format);

            println!(
                "\nQUOTES (sorted by {}, page {} of {} rows)\n",
                comparison.sort.as_str(),
                comparison.quotes.page,
                comparison.quotes.total
            );
            for (i, row) in comparison.quotes.items.iter().enumerate() {
                println!(
                    "{}. {} [{:.1}] | 1: {} | X: {} | 2: {}",
                    i + 1,
                    row.display_name(),
                    row.rating(),
                    format_price(row.quote.price(Outcome::Home), format),
                    format_price(row.quote.price(Outcome::Draw), format),
                    format_price(row.quote.price(Outcome::Away), format),
                );
            }

            if args.csv && !comparison.quotes.items.is_empty() {
                let file = settings.cache_dir.join(format!("quotes_{}.csv", match_id));
                save_quotes_to_csv(&comparison.quotes.items, format, &file)?;
                println!("\nSaved quotes to {}", file.display());
            }
        }
        None => {
            let matches = aggregator.list_matches(&Default::default(), args.page, per_page)?;
            println!("MATCHES ({} total)\n", matches.total);
            for summary in &matches.items {
                println!(
                    "{} | {} vs {} | {} bookmakers",
                    summary.fixture.match_id,
                    summary.fixture.home_team,
                    summary.fixture.away_team,
                    summary.bookmaker_count
                );
                print_best(&summary.best, format);
                println!();
            }

            let operators = aggregator.rank_operators(&OperatorRequest {
                sort,
                filters,
                page: args.page,
                per_page,
            })?;
            println!("OPERATORS (sorted by {})\n", sort.as_str());
            if operators.items.is_empty() {
                println!("No operators match the filters.");
            }
            for (i, operator) in operators.items.iter().enumerate() {
                println!(
                    "{}. {} [{:.1}] {}",
                    i + 1,
                    operator.display_name,
                    operator.normalized_rating(),
                    operator.bonus_description.as_deref().unwrap_or("")
                );
            }

            if args.csv && !operators.items.is_empty() {
                let file = settings.cache_dir.join("operators.csv");
                save_operators_to_csv(&operators.items, &file)?;
                println!("\nSaved operators to {}", file.display());
            }
        }
    }

    Ok(())
}

fn print_best(best: &BestOddsResult, format: OddsFormat) {
    for outcome in Outcome::ALL {
        let Some(price) = best.get(outcome) else {
            continue;
        };
        println!(
            "  Best {}: {} ({})",
            outcome.as_str(),
            format_price(price.price(), format),
            price.bookmaker_id().unwrap_or("-")
        );
    }
    if let Some(profit) = best.sure_bet() {
        println!("  Sure bet across bookmakers: {:.2}% profit", profit);
    }
}
