use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::sources::{RateTable, SourceCountry};

/// Bounds of the random multiplier applied per head when estimating GDP.
pub const GDP_MULTIPLIER_MIN: f64 = 1000.0;
pub const GDP_MULTIPLIER_MAX: f64 = 2000.0;

/// A country after enrichment, ready to be upserted.
///
/// `estimated_gdp` is an approximation with a random component; two refreshes
/// over identical upstream data will not produce the same value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRecord {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: Option<i64>,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Map one upstream country plus the rate table into a [`CountryRecord`].
pub fn enrich<R: Rng + ?Sized>(
    source: &SourceCountry,
    rates: &RateTable,
    refreshed_at: DateTime<Utc>,
    rng: &mut R,
) -> CountryRecord {
    let currency_code = source.primary_currency_code().map(str::to_string);
    let exchange_rate = currency_code
        .as_deref()
        .and_then(|code| rates.get(code).copied());
    let estimated_gdp = estimate_gdp(
        source.population,
        currency_code.as_deref(),
        exchange_rate,
        rng,
    );

    CountryRecord {
        name: source.name.trim().to_string(),
        capital: non_blank(source.capital.as_deref()),
        region: non_blank(source.region.as_deref()),
        population: source.population,
        currency_code,
        exchange_rate,
        estimated_gdp,
        flag_url: non_blank(source.flag.as_deref()),
        last_refreshed_at: refreshed_at,
    }
}

/// Estimated GDP rule:
/// - no population: `None`
/// - population, no currency: `Some(0.0)`
/// - population, currency, rate > 0: `population * U(1000, 2000) / rate`
/// - anything else: `None`
///
/// The multiplier is only drawn in the third case.
pub fn estimate_gdp<R: Rng + ?Sized>(
    population: Option<i64>,
    currency_code: Option<&str>,
    exchange_rate: Option<f64>,
    rng: &mut R,
) -> Option<f64> {
    let population = population?;
    if currency_code.is_none() {
        return Some(0.0);
    }
    match exchange_rate {
        Some(rate) if rate > 0.0 => {
            let multiplier = rng.gen_range(GDP_MULTIPLIER_MIN..GDP_MULTIPLIER_MAX);
            Some(population as f64 * multiplier / rate)
        }
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
