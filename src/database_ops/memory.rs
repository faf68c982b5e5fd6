use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::settings::{self, LAST_REFRESHED_AT};
use super::{
    validate_record, Country, CountryFilter, CountryStore, SortKey, StoreError, StoreStatus,
};
use crate::normalization::CountryRecord;

#[derive(Debug, Clone, Default)]
struct State {
    rows: Vec<Country>,
    settings: HashMap<String, String>,
    next_id: i64,
}

impl State {
    fn upsert(&mut self, record: &CountryRecord) -> Result<Country, StoreError> {
        validate_record(record)?;
        let wanted = record.name.to_lowercase();
        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|row| row.name.to_lowercase() == wanted)
        {
            row.capital = record.capital.clone();
            row.region = record.region.clone();
            row.population = record.population;
            row.currency_code = record.currency_code.clone();
            row.exchange_rate = record.exchange_rate;
            row.estimated_gdp = record.estimated_gdp;
            row.flag_url = record.flag_url.clone();
            row.last_refreshed_at = record.last_refreshed_at;
            return Ok(row.clone());
        }

        self.next_id += 1;
        let row = Country {
            id: self.next_id,
            name: record.name.clone(),
            capital: record.capital.clone(),
            region: record.region.clone(),
            population: record.population,
            currency_code: record.currency_code.clone(),
            exchange_rate: record.exchange_rate,
            estimated_gdp: record.estimated_gdp,
            flag_url: record.flag_url.clone(),
            last_refreshed_at: record.last_refreshed_at,
        };
        self.rows.push(row.clone());
        Ok(row)
    }
}

/// In-process store. A refresh is applied to a copy of the state that only
/// replaces the live state once every record has been accepted.
#[derive(Clone, Default)]
pub struct MemoryCountryStore {
    inner: Arc<RwLock<State>>,
}

impl MemoryCountryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn eq_ignore_case(value: Option<&str>, wanted: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase() == wanted.to_lowercase())
}

// Case-folded first, same as `ORDER BY LOWER(name), name` in the pg store.
fn cmp_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// Nulls last regardless of direction.
fn cmp_gdp(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl CountryStore for MemoryCountryStore {
    async fn apply_refresh(
        &self,
        records: &[CountryRecord],
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut live = self.inner.write().await;
        let mut next = live.clone();
        for record in records {
            next.upsert(record)?;
        }
        next.settings.insert(
            LAST_REFRESHED_AT.to_string(),
            settings::format_timestamp(refreshed_at),
        );
        *live = next;
        debug!(records = records.len(), "memory refresh applied");
        Ok(())
    }

    async fn upsert_country(&self, record: &CountryRecord) -> Result<Country, StoreError> {
        self.inner.write().await.upsert(record)
    }

    async fn list_countries(&self, filter: &CountryFilter) -> Result<Vec<Country>, StoreError> {
        let state = self.inner.read().await;
        let mut rows: Vec<Country> = state
            .rows
            .iter()
            .filter(|row| {
                filter
                    .region
                    .as_deref()
                    .map_or(true, |r| eq_ignore_case(row.region.as_deref(), r))
            })
            .filter(|row| {
                filter
                    .currency
                    .as_deref()
                    .map_or(true, |c| eq_ignore_case(row.currency_code.as_deref(), c))
            })
            .cloned()
            .collect();

        // Rows are kept in id order, so a stable sort leaves ties by id.
        match filter.sort {
            Some(SortKey::GdpDesc) => {
                rows.sort_by(|a, b| cmp_gdp(a.estimated_gdp, b.estimated_gdp, true))
            }
            Some(SortKey::GdpAsc) => {
                rows.sort_by(|a, b| cmp_gdp(a.estimated_gdp, b.estimated_gdp, false))
            }
            Some(SortKey::NameAsc) => rows.sort_by(|a, b| cmp_name(&a.name, &b.name)),
            Some(SortKey::NameDesc) => rows.sort_by(|a, b| cmp_name(&b.name, &a.name)),
            None => {}
        }
        Ok(rows)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Country>, StoreError> {
        let state = self.inner.read().await;
        Ok(state
            .rows
            .iter()
            .find(|row| eq_ignore_case(Some(&row.name), name))
            .cloned())
    }

    async fn delete_by_name(&self, name: &str) -> Result<bool, StoreError> {
        let mut state = self.inner.write().await;
        let before = state.rows.len();
        state.rows.retain(|row| !eq_ignore_case(Some(&row.name), name));
        Ok(state.rows.len() < before)
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let state = self.inner.read().await;
        Ok(StoreStatus {
            total_countries: state.rows.len() as i64,
            last_refreshed_at: state.settings.get(LAST_REFRESHED_AT).cloned(),
        })
    }

    async fn ping(&self) -> bool {
        true
    }
}
