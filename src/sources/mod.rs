//! Outbound clients for the two upstream data sets: the country catalog and
//! the USD exchange-rate table.
//!
//! Both clients share one contract: a single GET with a bounded timeout and a
//! fixed user agent. Any transport error, timeout, non-2xx status or
//! undecodable body becomes [`SourceError::Unavailable`] carrying the URL that
//! failed. Nothing is retried and no partial payload is returned.

pub mod exchange;
pub mod rest_countries;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::util::env as env_util;

pub use exchange::ExchangeRateClient;
pub use rest_countries::RestCountriesClient;

pub const DEFAULT_COUNTRIES_URL: &str =
    "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies";
pub const DEFAULT_RATES_URL: &str = "https://open.er-api.com/v6/latest/USD";
pub const DEFAULT_USER_AGENT: &str = "Country-Currency-API/1.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Currency code -> units of that currency per 1 USD.
pub type RateTable = HashMap<String, f64>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("could not fetch data from {url}: {reason}")]
    Unavailable { url: String, reason: String },
}

impl SourceError {
    pub fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Unavailable { url, .. } => url,
        }
    }
}

/// One entry of the upstream country catalog, as delivered.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SourceCountry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Option<i64>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<SourceCurrency>>,
}

impl SourceCountry {
    /// Code of the first listed currency, if any and non-blank.
    pub fn primary_currency_code(&self) -> Option<&str> {
        self.currencies
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|c| c.code.as_deref())
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SourceCurrency {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_countries(&self) -> Result<Vec<SourceCountry>, SourceError>;
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable, SourceError>;
}

/// Endpoint and transport settings shared by both clients.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub countries_url: String,
    pub rates_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            rates_url: DEFAULT_RATES_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            countries_url: env_util::env_opt("REST_COUNTRIES_URL")
                .unwrap_or(defaults.countries_url),
            rates_url: env_util::env_opt("EXCHANGE_RATES_URL").unwrap_or(defaults.rates_url),
            timeout: Duration::from_secs(env_util::env_parse(
                "UPSTREAM_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )),
            user_agent: env_util::env_opt("UPSTREAM_USER_AGENT").unwrap_or(defaults.user_agent),
        }
    }

    pub fn http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .user_agent(self.user_agent.clone())
            .timeout(self.timeout)
            .build()
    }
}

/// GET `url` and decode the JSON body, folding every failure into
/// [`SourceError::Unavailable`].
pub(crate) async fn get_json<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T, SourceError> {
    debug!(url, "fetching upstream");
    let resp = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            warn!(url, error = %e, "upstream request failed");
            SourceError::unavailable(url, e)
        })?;
    resp.json::<T>().await.map_err(|e| {
        warn!(url, error = %e, "upstream body could not be decoded");
        SourceError::unavailable(url, e)
    })
}
