use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{get_json, RateSource, RateTable, SourceError, UpstreamConfig};

/// USD-based exchange-rate table from open.er-api.com (or any endpoint with
/// the same `{"rates": {"EUR": 0.92, ...}}` shape).
#[derive(Debug, Clone)]
pub struct ExchangeRateClient {
    url: String,
    http: Client,
}

// `rates` is required: an error payload without it must fail the fetch.
#[derive(Debug, Deserialize)]
struct LatestRatesPayload {
    rates: serde_json::Map<String, Value>,
}

impl ExchangeRateClient {
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        Ok(Self {
            url: config.rates_url.clone(),
            http: config.http_client()?,
        })
    }

    pub fn with_client(url: impl Into<String>, http: Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateSource for ExchangeRateClient {
    async fn fetch_rates(&self) -> Result<RateTable, SourceError> {
        let payload: LatestRatesPayload = get_json(&self.http, &self.url).await?;
        let rates = rate_table(payload.rates);
        info!(rates = rates.len(), "fetched exchange rates");
        Ok(rates)
    }
}

// Non-numeric entries are skipped rather than failing the whole table.
fn rate_table(raw: serde_json::Map<String, Value>) -> RateTable {
    raw.into_iter()
        .filter_map(|(code, v)| v.as_f64().map(|rate| (code.trim().to_uppercase(), rate)))
        .collect()
}
