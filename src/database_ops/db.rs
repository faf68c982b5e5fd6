use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

use crate::util::env as env_util;

pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        // Ensure TLS is enabled when DSN contains sslmode=require
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");

        // Optional auto-migrate gate (default: OFF). Enable with AUTO_MIGRATE=1/true/on.
        if env_util::env_flag("AUTO_MIGRATE", false) {
            let dir = migrations_dir();
            info!(dir = ?dir, "running migrations (AUTO_MIGRATE=on)");
            run_migrations(&pool, &dir).await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(Self { pool })
    }
}

/// Migrations directory from `MIGRATIONS_DIR`, defaulting to `./migrations`.
pub fn migrations_dir() -> PathBuf {
    env_util::env_opt("MIGRATIONS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR))
}

/// Split `NNNN_description.sql` into its version and description. Files that
/// do not match the pattern are not migrations.
pub fn parse_migration_filename(fname: &str) -> Option<(i64, String)> {
    let stem = fname.strip_suffix(".sql")?;
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = stem[digits.len()..].strip_prefix('_')?;
    let version = digits.parse::<i64>().ok()?;
    Some((version, rest.to_string()))
}

fn pending_migrations(dir: &Path, applied: &HashSet<i64>) -> Result<Vec<(i64, String, PathBuf)>> {
    let mut candidates: Vec<(i64, String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(fname) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Some((version, desc)) = parse_migration_filename(fname) {
            if !applied.contains(&version) {
                candidates.push((version, desc, path));
            }
        }
    }
    candidates.sort_by_key(|(v, _, _)| *v);
    Ok(candidates)
}

/// Lightweight migration runner: applies every pending `NNNN_name.sql` file in
/// version order, each in its own transaction together with its tracking row.
/// Returns the number of files applied.
pub async fn run_migrations(pool: &PgPool, dir: &Path) -> Result<usize> {
    if !dir.exists() {
        anyhow::bail!("migrations directory not found: {}", dir.display());
    }
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS _sqlx_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT,
            installed_at TIMESTAMPTZ DEFAULT now()
         )",
    )
    .execute(pool)
    .await?;

    let applied_rows = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(pool)
        .await?;
    let mut applied: HashSet<i64> = HashSet::new();
    for r in applied_rows {
        applied.insert(r.try_get::<i64, _>(0)?);
    }

    let mut count = 0usize;
    for (version, desc, path) in pending_migrations(dir, &applied)? {
        let sql = std::fs::read_to_string(&path)
            .with_context(|| format!("reading migration {}", path.display()))?;
        info!(version, file = ?path, "applying migration");

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(&sql)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {version} ({desc}) failed"))?;
        sqlx::query("INSERT INTO _sqlx_migrations (version, description) VALUES ($1, $2)")
            .bind(version)
            .bind(&desc)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        count += 1;
    }

    if let Ok(r) = sqlx::query(
        "SELECT version, description FROM _sqlx_migrations ORDER BY version DESC LIMIT 1",
    )
    .fetch_one(pool)
    .await
    {
        let version: i64 = r.try_get(0).unwrap_or_default();
        let desc: String = r
            .try_get::<Option<String>, _>(1)
            .ok()
            .flatten()
            .unwrap_or_default();
        info!(version, desc, applied = count, "migrations up-to-date");
    }
    Ok(count)
}
