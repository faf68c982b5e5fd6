// HTTP request handlers for API endpoints

use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use std::io::ErrorKind;

use crate::api::errors::ApiError;
use crate::api::models::*;
use crate::api::server::AppState;
use crate::api::validation;
use crate::normalization::enrich;
use crate::sources::RateTable;

pub const BANNER: &str = "Country Currency & Exchange API is running!";

type ApiResult = Result<HttpResponse, ApiError>;

pub async fn root() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(BANNER)
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = if state.store.ping().await {
        "connected"
    } else {
        "disconnected"
    };
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Run a full refresh and report how many countries were processed.
pub async fn refresh_countries(state: web::Data<AppState>) -> ApiResult {
    tracing::info!("refresh requested");
    let summary = state.pipeline.run().await?;
    Ok(HttpResponse::Ok().json(RefreshResponse {
        message: "Countries data refreshed successfully".to_string(),
        total_countries_processed: summary.total_countries_processed,
    }))
}

pub async fn list_countries(
    state: web::Data<AppState>,
    query: web::Query<ListCountriesQuery>,
) -> ApiResult {
    let filter = validation::list_filter(query.into_inner())?;
    let rows = state.store.list_countries(&filter).await?;
    Ok(HttpResponse::Ok().json(rows))
}

pub async fn get_country(state: web::Data<AppState>, name: web::Path<String>) -> ApiResult {
    match state.store.find_by_name(&name).await? {
        Some(country) => Ok(HttpResponse::Ok().json(country)),
        None => Err(ApiError::NotFound("Country not found")),
    }
}

pub async fn delete_country(state: web::Data<AppState>, name: web::Path<String>) -> ApiResult {
    let name = name.into_inner();
    if !state.store.delete_by_name(&name).await? {
        return Err(ApiError::NotFound("Country not found"));
    }
    tracing::info!(country = %name, "country deleted");
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("Country '{name}' deleted successfully"),
    }))
}

/// Validate, enrich and upsert a single country supplied by the caller.
pub async fn create_country(
    state: web::Data<AppState>,
    payload: web::Json<CreateCountryRequest>,
) -> ApiResult {
    let new = validation::validate_create(payload.into_inner())?;

    let mut rates = RateTable::new();
    if let (Some(code), Some(rate)) = (new.currency_code(), new.exchange_rate) {
        rates.insert(code.to_string(), rate);
    }
    let record = state
        .pipeline
        .with_rng(|rng| enrich(&new.country, &rates, Utc::now(), rng));

    let stored = state.store.upsert_country(&record).await?;
    tracing::info!(country = %stored.name, id = stored.id, "country stored");
    Ok(HttpResponse::Created().json(stored))
}

pub async fn status(state: web::Data<AppState>) -> ApiResult {
    let status = state.store.status().await?;
    Ok(HttpResponse::Ok().json(StatusResponse {
        total_countries: status.total_countries,
        last_refreshed_at: status.last_refreshed_at,
    }))
}

pub async fn summary_image(state: web::Data<AppState>) -> ApiResult {
    let path = state.pipeline.renderer().path();
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .content_type("image/png")
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .body(bytes)),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "summary image unreadable");
            }
            Err(ApiError::NotFound("Summary image not found"))
        }
    }
}

pub async fn not_found() -> ApiResult {
    Err(ApiError::NotFound("Route not found"))
}
