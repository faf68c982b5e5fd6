// API server implementation using actix-web

use crate::api::errors::ApiError;
use crate::api::{handlers, middleware, routes};
use crate::database_ops::{CountryStore, Db, MemoryCountryStore, PgCountryStore};
use crate::orchestrator::RefreshPipeline;
use crate::render::SummaryRenderer;
use crate::sources::UpstreamConfig;
use crate::util::env as env_util;
use actix_web::{web, App, HttpServer};
use anyhow::{bail, Context, Result};
use std::sync::Arc;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const DEFAULT_DB_MAX_CONNS: u32 = 10;
const JSON_LIMIT_BYTES: usize = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CountryStore>,
    pub pipeline: Arc<RefreshPipeline>,
}

impl AppState {
    pub fn new(pipeline: RefreshPipeline) -> Self {
        Self {
            store: pipeline.store().clone(),
            pipeline: Arc::new(pipeline),
        }
    }

    /// Store, upstream clients and renderer as configured by the environment.
    pub async fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let store = store_from_env().await?;
        let cache_dir =
            env_util::env_opt("CACHE_DIR").unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());
        let mut pipeline = RefreshPipeline::from_upstream(
            &UpstreamConfig::from_env(),
            store,
            SummaryRenderer::in_cache_dir(&cache_dir),
        )
        .context("Failed to build upstream HTTP client")?;
        if let Some(seed) = env_util::env_parse_opt::<u64>("GDP_SEED") {
            tracing::info!(seed, "using seeded GDP multipliers");
            pipeline = pipeline.with_seed(seed);
        }
        Ok(Self::new(pipeline))
    }
}

async fn store_from_env() -> Result<Arc<dyn CountryStore>> {
    let backend = env_util::env_opt("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
    match backend.to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" | "pg" => {
            let url = env_util::db_url()
                .context("DATABASE_URL is required unless STORE_BACKEND=memory")?;
            let max_conns = env_util::env_parse("DB_MAX_CONNS", DEFAULT_DB_MAX_CONNS);
            let db = Db::connect(&url, max_conns)
                .await
                .context("Failed to connect to database")?;
            Ok(Arc::new(PgCountryStore::new(db)))
        }
        "memory" => {
            tracing::warn!("STORE_BACKEND=memory: data is lost on restart");
            Ok(Arc::new(MemoryCountryStore::new()))
        }
        other => bail!("unknown STORE_BACKEND '{other}' (expected postgres or memory)"),
    }
}

/// Register state, extractor error handlers and routes. Shared by the server
/// and the HTTP tests.
pub fn configure_app(state: web::Data<AppState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(state)
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_LIMIT_BYTES)
                    .error_handler(|err, _req| ApiError::validation("body", err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| ApiError::validation("query", err.to_string()).into()),
            )
            .configure(routes::configure_routes)
            .default_service(web::to(handlers::not_found));
    }
}

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_util::env_opt("API_PORT").or_else(|| env_util::env_opt("PORT")) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("Invalid API_PORT '{raw}'"))?,
            None => DEFAULT_PORT,
        };
        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, state: AppState) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            image = %state.pipeline.renderer().path().display(),
            "Starting country API server"
        );

        let state = web::Data::new(state);
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(configure_app(state.clone()))
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
