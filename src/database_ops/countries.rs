use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::{debug, info, instrument};

use super::settings::{self, LAST_REFRESHED_AT};
use super::{
    validate_record, Country, CountryFilter, CountryStore, Db, SortKey, StoreError, StoreStatus,
};
use crate::normalization::CountryRecord;

const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at";

// Serializes refreshes across processes for the lifetime of the transaction.
const REFRESH_LOCK_KEY: i64 = 0x636f_756e_7472_79;

#[derive(Clone)]
pub struct PgCountryStore {
    db: Db,
}

impl PgCountryStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

/// Look up by case-insensitive name, then update in place or insert.
async fn upsert_on(conn: &mut PgConnection, record: &CountryRecord) -> Result<Country, StoreError> {
    validate_record(record)?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM countries WHERE LOWER(name) = LOWER($1)")
            .bind(&record.name)
            .fetch_optional(&mut *conn)
            .await?;

    let row = match existing {
        Some(id) => {
            debug!(id, name = %record.name, "updating country");
            sqlx::query_as::<_, Country>(&format!(
                "UPDATE countries SET capital = $1, region = $2, population = $3, \
                 currency_code = $4, exchange_rate = $5, estimated_gdp = $6, flag_url = $7, \
                 last_refreshed_at = $8 WHERE id = $9 RETURNING {COUNTRY_COLUMNS}"
            ))
            .bind(&record.capital)
            .bind(&record.region)
            .bind(record.population)
            .bind(&record.currency_code)
            .bind(record.exchange_rate)
            .bind(record.estimated_gdp)
            .bind(&record.flag_url)
            .bind(record.last_refreshed_at)
            .bind(id)
            .fetch_one(&mut *conn)
            .await?
        }
        None => {
            debug!(name = %record.name, "inserting country");
            sqlx::query_as::<_, Country>(&format!(
                "INSERT INTO countries (name, capital, region, population, currency_code, \
                 exchange_rate, estimated_gdp, flag_url, last_refreshed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {COUNTRY_COLUMNS}"
            ))
            .bind(&record.name)
            .bind(&record.capital)
            .bind(&record.region)
            .bind(record.population)
            .bind(&record.currency_code)
            .bind(record.exchange_rate)
            .bind(record.estimated_gdp)
            .bind(&record.flag_url)
            .bind(record.last_refreshed_at)
            .fetch_one(&mut *conn)
            .await?
        }
    };
    Ok(row)
}

/// SELECT for the list endpoint. Filters compare case-insensitively; GDP
/// orderings keep nulls last in both directions.
pub fn list_query(filter: &CountryFilter) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE 1=1"));
    if let Some(region) = filter.region.as_deref() {
        qb.push(" AND LOWER(region) = LOWER(").push_bind(region).push(")");
    }
    if let Some(currency) = filter.currency.as_deref() {
        qb.push(" AND UPPER(currency_code) = UPPER(")
            .push_bind(currency)
            .push(")");
    }
    qb.push(match filter.sort {
        Some(SortKey::GdpDesc) => " ORDER BY estimated_gdp DESC NULLS LAST, id",
        Some(SortKey::GdpAsc) => " ORDER BY estimated_gdp ASC NULLS LAST, id",
        Some(SortKey::NameAsc) => " ORDER BY LOWER(name) ASC, name ASC, id",
        Some(SortKey::NameDesc) => " ORDER BY LOWER(name) DESC, name DESC, id",
        None => " ORDER BY id",
    });
    qb
}

#[async_trait]
impl CountryStore for PgCountryStore {
    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn apply_refresh(
        &self,
        records: &[CountryRecord],
        refreshed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.db.pool.begin().await?;
        // Must be the first statement of the transaction.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(REFRESH_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        for record in records {
            upsert_on(&mut tx, record).await?;
        }
        settings::upsert_setting(
            &mut tx,
            LAST_REFRESHED_AT,
            &settings::format_timestamp(refreshed_at),
            refreshed_at,
        )
        .await?;

        tx.commit().await?;
        info!(records = records.len(), "refresh committed");
        Ok(())
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    async fn upsert_country(&self, record: &CountryRecord) -> Result<Country, StoreError> {
        let mut tx = self.db.pool.begin().await?;
        let row = upsert_on(&mut tx, record).await?;
        tx.commit().await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn list_countries(&self, filter: &CountryFilter) -> Result<Vec<Country>, StoreError> {
        let mut qb = list_query(filter);
        let rows = qb
            .build_query_as::<Country>()
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Option<Country>, StoreError> {
        let row = sqlx::query_as::<_, Country>(&format!(
            "SELECT {COUNTRY_COLUMNS} FROM countries WHERE LOWER(name) = LOWER($1)"
        ))
        .bind(name)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn delete_by_name(&self, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM countries WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let mut conn = self.db.pool.acquire().await?;
        let total_countries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(&mut *conn)
            .await?;
        let last_refreshed_at = settings::get_setting(&mut conn, LAST_REFRESHED_AT).await?;
        Ok(StoreStatus {
            total_countries,
            last_refreshed_at,
        })
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .fetch_one(&self.db.pool)
            .await
            .is_ok()
    }
}
