//! The refresh pipeline: fetch both upstream data sets, enrich every country,
//! persist the batch in one unit of work, then render the summary image.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::database_ops::{CountryStore, StoreError};
use crate::normalization::{enrich, CountryRecord};
use crate::render::SummaryRenderer;
use crate::sources::{
    CountrySource, ExchangeRateClient, RateSource, RateTable, RestCountriesClient, SourceCountry,
    SourceError, UpstreamConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    Upstream(#[from] SourceError),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub total_countries_processed: usize,
    pub refreshed_at: DateTime<Utc>,
    pub image_generated: bool,
}

pub struct RefreshPipeline {
    countries: Arc<dyn CountrySource>,
    rates: Arc<dyn RateSource>,
    store: Arc<dyn CountryStore>,
    renderer: SummaryRenderer,
    rng: Mutex<StdRng>,
    // Held for the whole run so refreshes in this process never interleave.
    running: tokio::sync::Mutex<()>,
}

impl RefreshPipeline {
    pub fn new(
        countries: Arc<dyn CountrySource>,
        rates: Arc<dyn RateSource>,
        store: Arc<dyn CountryStore>,
        renderer: SummaryRenderer,
    ) -> Self {
        Self {
            countries,
            rates,
            store,
            renderer,
            rng: Mutex::new(StdRng::from_entropy()),
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Pipeline backed by the real HTTP clients.
    pub fn from_upstream(
        config: &UpstreamConfig,
        store: Arc<dyn CountryStore>,
        renderer: SummaryRenderer,
    ) -> reqwest::Result<Self> {
        Ok(Self::new(
            Arc::new(RestCountriesClient::new(config)?),
            Arc::new(ExchangeRateClient::new(config)?),
            store,
            renderer,
        ))
    }

    /// Make the GDP multipliers reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn store(&self) -> &Arc<dyn CountryStore> {
        &self.store
    }

    pub fn renderer(&self) -> &SummaryRenderer {
        &self.renderer
    }

    /// Run `f` with the pipeline's random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn transform(
        &self,
        countries: &[SourceCountry],
        rates: &RateTable,
        refreshed_at: DateTime<Utc>,
    ) -> Vec<CountryRecord> {
        self.with_rng(|rng| {
            countries
                .iter()
                .map(|c| enrich(c, rates, refreshed_at, rng))
                .collect()
        })
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<RefreshSummary, RefreshError> {
        let _running = self.running.lock().await;
        let started = Instant::now();
        let refreshed_at = Utc::now();

        let countries = self.countries.fetch_countries().await?;
        let rates = self.rates.fetch_rates().await?;

        let records = self.transform(&countries, &rates, refreshed_at);
        let total = records.len();
        self.store.apply_refresh(&records, refreshed_at).await?;

        let renderer = self.renderer.clone();
        let image_generated =
            tokio::task::spawn_blocking(move || renderer.render(&records, total, refreshed_at))
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "summary render task failed");
                    false
                });

        info!(
            countries = total,
            rates = rates.len(),
            image_generated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh complete"
        );
        Ok(RefreshSummary {
            total_countries_processed: total,
            refreshed_at,
            image_generated,
        })
    }
}
