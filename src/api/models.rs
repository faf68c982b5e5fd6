// API request/response models (DTOs)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body: `{"error": "...", "details": ...}`; `details` is omitted when absent.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Serialize) -> Self {
        Self {
            error: error.into(),
            details: serde_json::to_value(details).ok(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub message: String,
    pub total_countries_processed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub total_countries: i64,
    pub last_refreshed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

/// Query string of `GET /countries`. `sort` is parsed separately so an
/// unknown key becomes a field-level validation error.
#[derive(Debug, Default, Deserialize)]
pub struct ListCountriesQuery {
    pub region: Option<String>,
    pub currency: Option<String>,
    pub sort: Option<String>,
}

/// Body of `POST /countries`. Fields are kept as raw JSON so the validator can
/// report type errors per field instead of rejecting the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct CreateCountryRequest {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: Value,
    #[serde(default)]
    pub currency_code: Value,
    #[serde(default)]
    pub exchange_rate: Value,
    #[serde(default)]
    pub flag_url: Option<String>,
}
