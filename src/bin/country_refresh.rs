// Run the refresh pipeline from the command line, once or on an interval
// (REFRESH_INTERVAL_SECS > 0).

use anyhow::Result;
use chrono::Utc;
use country_fx_api::api::AppState;
use country_fx_api::orchestrator::RefreshPipeline;
use country_fx_api::util::{env as env_util, logging};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    logging::init_tracing(logging::DEFAULT_FILTER)?;

    let state = AppState::from_env().await?;
    let interval_secs: u64 = env_util::env_parse("REFRESH_INTERVAL_SECS", 0u64);

    if interval_secs == 0 {
        // one-shot
        run_once(&state.pipeline).await?;
    } else {
        tracing::info!(interval_secs, "refreshing on an interval");
        loop {
            if let Err(e) = run_once(&state.pipeline).await {
                tracing::error!(error = ?e, "refresh failed");
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    }
    Ok(())
}

async fn run_once(pipeline: &RefreshPipeline) -> Result<()> {
    let start = Utc::now();
    let summary = pipeline.run().await?;
    println!(
        "[country_refresh] processed={} image={} elapsed_ms={} ts={}",
        summary.total_countries_processed,
        summary.image_generated,
        (Utc::now() - start).num_milliseconds(),
        summary.refreshed_at.to_rfc3339()
    );
    Ok(())
}
