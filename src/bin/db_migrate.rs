use anyhow::{Context, Result};
use country_fx_api::database_ops::db::{migrations_dir, run_migrations};
use country_fx_api::util::env::{db_url, init_env, preflight_check};
use country_fx_api::util::logging;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    logging::init_tracing(logging::DEFAULT_FILTER)?;

    let dir = migrations_dir();
    if !dir.exists() {
        error!(?dir, "migrations directory not found");
        anyhow::bail!("migrations directory not found: {}", dir.display());
    }

    preflight_check(
        "db_migrate",
        &[],
        &["DATABASE_URL", "DB_URL", "DB_HOST", "MIGRATIONS_DIR"],
    )?;
    let url = db_url().context("no database URL env vars set (DATABASE_URL | DB_URL | DB_HOST)")?;

    let mut connect_options = PgConnectOptions::from_str(&url)?;
    if url.contains("sslmode=require") {
        connect_options = connect_options.ssl_mode(PgSslMode::Require);
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .context("failed to connect to database")?;

    info!(dir = %dir.display(), "running migrations");
    let applied = run_migrations(&pool, &dir).await?;
    info!(applied, "migrations completed successfully");
    Ok(())
}
