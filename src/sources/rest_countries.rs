use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{get_json, CountrySource, SourceCountry, SourceError, UpstreamConfig};

/// Country catalog client for the restcountries v2 `all` endpoint.
///
/// Only `name`, `capital`, `region`, `population`, `flag` and `currencies`
/// are read; every other field in the payload is ignored.
#[derive(Debug, Clone)]
pub struct RestCountriesClient {
    url: String,
    http: Client,
}

impl RestCountriesClient {
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        Ok(Self {
            url: config.countries_url.clone(),
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
impl CountrySource for RestCountriesClient {
    async fn fetch_countries(&self) -> Result<Vec<SourceCountry>, SourceError> {
        let countries: Vec<SourceCountry> = get_json(&self.http, &self.url).await?;
        info!(countries = countries.len(), "fetched country catalog");
        Ok(countries)
    }
}
