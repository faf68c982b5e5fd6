//! Keyed rows in `global_settings`.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::PgConnection;

pub const LAST_REFRESHED_AT: &str = "last_refreshed_at";

/// Stored representation of a refresh timestamp, e.g. `2025-10-22T18:04:05.123Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn upsert_setting(
    conn: &mut PgConnection,
    key: &str,
    value: &str,
    updated_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO global_settings (setting_key, setting_value, updated_at) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (setting_key) \
         DO UPDATE SET setting_value = EXCLUDED.setting_value, updated_at = EXCLUDED.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_setting(conn: &mut PgConnection, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT setting_value FROM global_settings WHERE setting_key = $1")
        .bind(key)
        .fetch_optional(conn)
        .await
}
