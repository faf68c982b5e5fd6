// HTTP API server binary for the country/currency service

use anyhow::Result;
use country_fx_api::api::{ApiServer, AppState};
use country_fx_api::util::{env as env_util, logging};

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    logging::init_tracing(logging::DEFAULT_FILTER)?;

    tracing::info!("Initializing country API server");

    env_util::preflight_check(
        "api_server",
        &[],
        &[
            "API_HOST",
            "API_PORT",
            "STORE_BACKEND",
            "DATABASE_URL",
            "CACHE_DIR",
            "REST_COUNTRIES_URL",
            "EXCHANGE_RATES_URL",
        ],
    )?;

    let server = ApiServer::from_env()?;
    let state = AppState::from_env().await?;

    server.run(state).await?;

    Ok(())
}
