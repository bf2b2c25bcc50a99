use crate::models::{BookmakerProfile, Outcome};
use crate::utils::odds_format::{format_price, OddsFormat};
use crate::utils::ranking::QuoteRow;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable data to a JSON cache file, creating the directory if needed
pub fn save_to_cache<T: Serialize + ?Sized>(data: &T, cache_file: impl AsRef<Path>) -> Result<()> {
    let cache_file = cache_file.as_ref();
    if let Some(dir) = cache_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize cache data")?;
    std::fs::write(cache_file, json)
        .with_context(|| format!("Failed to write cache file {}", cache_file.display()))?;
    Ok(())
}

/// Load data from a JSON cache file
pub fn load_from_cache<T: DeserializeOwned>(cache_file: impl AsRef<Path>) -> Result<T> {
    let cache_file = cache_file.as_ref();
    let json = std::fs::read_to_string(cache_file)
        .with_context(|| format!("Failed to read cache file {}", cache_file.display()))?;
    serde_json::from_str(&json).context("Failed to deserialize cache data")
}

/// One line of the quotes CSV export
#[derive(Debug, Serialize)]
struct QuoteCsvRecord<'a> {
    #[serde(rename = "Bookmaker")]
    bookmaker: &'a str,
    #[serde(rename = "Rating")]
    rating: String,
    #[serde(rename = "Home")]
    home: String,
    #[serde(rename = "Draw")]
    draw: String,
    #[serde(rename = "Away")]
    away: String,
    #[serde(rename = "Last Updated")]
    last_updated: String,
}

/// Write ranked quote rows to CSV, prices in the requested format
pub fn write_quotes_csv<W: std::io::Write>(
    rows: &[QuoteRow],
    format: OddsFormat,
    writer: W,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        let rating = row
            .bookmaker
            .as_ref()
            .map(BookmakerProfile::normalized_rating)
            .unwrap_or(0.0);
        csv.serialize(QuoteCsvRecord {
            bookmaker: row
                .bookmaker
                .as_ref()
                .map(|b| b.display_name.as_str())
                .unwrap_or(row.quote.bookmaker_id.as_str()),
            rating: format!("{:.1}", rating),
            home: format_price(row.quote.price(Outcome::Home), format),
            draw: format_price(row.quote.price(Outcome::Draw), format),
            away: format_price(row.quote.price(Outcome::Away), format),
            last_updated: row.quote.last_updated.to_rfc3339(),
        })
        .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// One line of the operators CSV export
#[derive(Debug, Serialize)]
struct OperatorCsvRecord<'a> {
    #[serde(rename = "Bookmaker")]
    bookmaker: &'a str,
    #[serde(rename = "Rating")]
    rating: String,
    #[serde(rename = "Bonus")]
    bonus: &'a str,
    #[serde(rename = "License")]
    license: &'a str,
    #[serde(rename = "Live Betting")]
    live_betting: bool,
    #[serde(rename = "Cash Out")]
    cash_out: bool,
}

pub fn write_operators_csv<W: std::io::Write>(operators: &[BookmakerProfile], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for operator in operators {
        csv.serialize(OperatorCsvRecord {
            bookmaker: &operator.display_name,
            rating: format!("{:.1}", operator.normalized_rating()),
            bonus: operator.bonus_description.as_deref().unwrap_or(""),
            license: operator.license.as_deref().unwrap_or(""),
            live_betting: operator.features.live_betting,
            cash_out: operator.features.cash_out,
        })
        .context("Failed to write CSV row")?;
    }
    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Save ranked quote rows to a CSV file
pub fn save_quotes_to_csv(rows: &[QuoteRow], format: OddsFormat, filename: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(filename.as_ref()).context("Failed to create CSV file")?;
    write_quotes_csv(rows, format, file)
}

/// Save ranked operators to a CSV file
pub fn save_operators_to_csv(operators: &[BookmakerProfile], filename: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(filename.as_ref()).context("Failed to create CSV file")?;
    write_operators_csv(operators, file)
}
