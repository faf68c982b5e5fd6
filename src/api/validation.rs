// Request validation for the write and query endpoints

use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::errors::ApiError;
use crate::api::models::{CreateCountryRequest, ListCountriesQuery};
use crate::database_ops::{CountryFilter, SortKey};
use crate::sources::{SourceCountry, SourceCurrency};

const REQUIRED: &str = "is required";

fn non_blank_string(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::Null => Err(REQUIRED),
        Value::String(s) if s.trim().is_empty() => Err(REQUIRED),
        Value::String(s) => Ok(s.trim().to_string()),
        _ => Err("must be a string"),
    }
}

fn positive_count(value: &Value) -> Result<i64, &'static str> {
    match value {
        Value::Null => Err(REQUIRED),
        Value::Number(n) => match n.as_i64() {
            Some(v) if v > 0 => Ok(v),
            Some(_) => Err("must be a positive number"),
            None => match n.as_f64() {
                Some(v) if v > 0.0 && v.fract() == 0.0 && v <= i64::MAX as f64 => Ok(v as i64),
                _ => Err("must be a positive number"),
            },
        },
        _ => Err("must be a number"),
    }
}

fn optional_rate(value: &Value) -> Result<Option<f64>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
            _ => Err("must be a non-negative number"),
        },
        _ => Err("must be a number"),
    }
}

/// A validated `POST /countries` body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCountry {
    pub country: SourceCountry,
    pub exchange_rate: Option<f64>,
}

impl NewCountry {
    pub fn currency_code(&self) -> Option<&str> {
        self.country.primary_currency_code()
    }
}

/// Check every field and report all failures at once.
pub fn validate_create(req: CreateCountryRequest) -> Result<NewCountry, ApiError> {
    let mut errors = BTreeMap::new();

    let name = non_blank_string(&req.name)
        .map_err(|m| errors.insert("name".to_string(), m.to_string()))
        .ok();
    let population = positive_count(&req.population)
        .map_err(|m| errors.insert("population".to_string(), m.to_string()))
        .ok();
    let code = non_blank_string(&req.currency_code)
        .map_err(|m| errors.insert("currency_code".to_string(), m.to_string()))
        .ok();
    let exchange_rate = optional_rate(&req.exchange_rate)
        .map_err(|m| errors.insert("exchange_rate".to_string(), m.to_string()))
        .ok()
        .flatten();

    match (name, population, code) {
        (Some(name), Some(population), Some(code)) if errors.is_empty() => Ok(NewCountry {
            country: SourceCountry {
                name,
                capital: req.capital,
                region: req.region,
                population: Some(population),
                flag: req.flag_url,
                currencies: Some(vec![SourceCurrency {
                    code: Some(code.to_ascii_uppercase()),
                    ..SourceCurrency::default()
                }]),
            },
            exchange_rate,
        }),
        _ => Err(ApiError::Validation(errors)),
    }
}

pub fn list_filter(query: ListCountriesQuery) -> Result<CountryFilter, ApiError> {
    let sort = match query.sort.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<SortKey>()
                .map_err(|msg| ApiError::validation("sort", msg))?,
        ),
    };
    let blank_to_none = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    Ok(CountryFilter {
        region: blank_to_none(query.region),
        currency: blank_to_none(query.currency),
        sort,
    })
}
