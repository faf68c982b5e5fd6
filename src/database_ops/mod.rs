//! Persistence for country records and the global settings row.
//!
//! [`CountryStore`] is the seam between the refresh pipeline / HTTP surface
//! and storage. `countries::PgCountryStore` is the PostgreSQL implementation;
//! `memory::MemoryCountryStore` keeps everything in-process.

pub mod countries;
pub mod db;
pub mod memory;
pub mod settings;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalization::CountryRecord;

pub use countries::PgCountryStore;
pub use db::Db;
pub use memory::MemoryCountryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// A persisted country row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Country {
    pub id: i64,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    GdpDesc,
    GdpAsc,
    NameAsc,
    NameDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::GdpDesc,
        SortKey::GdpAsc,
        SortKey::NameAsc,
        SortKey::NameDesc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::GdpDesc => "gdp_desc",
            SortKey::GdpAsc => "gdp_asc",
            SortKey::NameAsc => "name_asc",
            SortKey::NameDesc => "name_desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                let allowed: Vec<&str> = SortKey::ALL.iter().map(SortKey::as_str).collect();
                format!("must be one of {}", allowed.join(", "))
            })
    }
}

/// Filters for listing. `region` and `currency` match case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub currency: Option<String>,
    pub sort: Option<SortKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStatus {
    pub total_countries: i64,
    pub last_refreshed_at: Option<String>,
}

#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Upsert every record by case-insensitive name and set the
    /// `last_refreshed_at` setting, all in one unit of work. On error nothing
    /// is applied.
    async fn apply_refresh(
        &self,
        records: &[CountryRecord],
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Upsert a single record outside of a refresh.
    async fn upsert_country(&self, record: &CountryRecord) -> Result<Country, StoreError>;

    async fn list_countries(&self, filter: &CountryFilter) -> Result<Vec<Country>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Country>, StoreError>;

    /// Returns `false` when no row matched.
    async fn delete_by_name(&self, name: &str) -> Result<bool, StoreError>;

    async fn status(&self) -> Result<StoreStatus, StoreError>;

    async fn ping(&self) -> bool;
}

/// Names are the natural key and must be non-blank.
pub(crate) fn validate_record(record: &CountryRecord) -> Result<(), StoreError> {
    if record.name.trim().is_empty() {
        return Err(StoreError::InvalidRecord(
            "country name must not be empty".to_string(),
        ));
    }
    Ok(())
}
