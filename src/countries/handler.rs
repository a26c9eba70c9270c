//! HTTP handlers for the Countries API
//!
//! Provides 6 REST endpoints:
//! - `POST /countries/refresh`: run a refresh cycle
//! - `GET /countries`: list countries (filter by region/currency, sort)
//! - `GET /countries/image`: cached summary image
//! - `GET /countries/:name`: country detail
//! - `DELETE /countries/:name`: delete a country
//! - `GET /status`: record count and last refresh time

use crate::countries::store::CountryStore;
use crate::countries::types::*;
use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::summary::SummaryCache;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Shared state for country handlers
#[derive(Clone)]
pub struct CountriesState {
    pub store: Arc<CountryStore>,
    pub refresher: Arc<Refresher>,
    pub cache: Arc<dyn SummaryCache>,
}

/// Create the countries router with all REST endpoints
pub fn countries_router(state: CountriesState) -> Router {
    Router::new()
        .route("/countries", get(list_countries))
        .route("/countries/refresh", post(refresh_countries))
        .route("/countries/image", get(get_summary_image))
        .route(
            "/countries/:name",
            get(get_country).delete(delete_country),
        )
        .route("/status", get(get_status))
        .with_state(state)
}

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListCountriesQuery {
    region: Option<String>,
    currency: Option<String>,
    sort: Option<String>,
}

impl ListCountriesQuery {
    /// Empty values and unknown sort orders are ignored
    fn into_filter(self) -> CountryFilter {
        CountryFilter {
            region: self.region.filter(|r| !r.is_empty()),
            currency: self.currency.filter(|c| !c.is_empty()),
            sort: self.sort.as_deref().and_then(|s| s.parse().ok()),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /countries/refresh
async fn refresh_countries(State(state): State<CountriesState>) -> Result<impl IntoResponse> {
    let outcome = state.refresher.refresh_countries().await?;
    Ok(Json(RefreshResponse {
        message: "Refresh complete".to_string(),
        count: outcome.total(),
    }))
}

/// GET /countries
async fn list_countries(
    State(state): State<CountriesState>,
    Query(params): Query<ListCountriesQuery>,
) -> Result<impl IntoResponse> {
    let countries = state.store.list(&params.into_filter()).await?;
    Ok(Json(countries))
}

/// GET /countries/image
async fn get_summary_image(State(state): State<CountriesState>) -> Result<impl IntoResponse> {
    let png = state.cache.get().await?.ok_or(Error::ArtifactMissing)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// GET /countries/:name
async fn get_country(
    State(state): State<CountriesState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let country = state.store.get(&name).await?;
    Ok(Json(country))
}

/// DELETE /countries/:name
async fn delete_country(
    State(state): State<CountriesState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    state.store.delete(&name).await?;
    tracing::info!(name = %name, "Country deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /status
///
/// Failures are reported as `200 {"error": "Internal server error"}`.
async fn get_status(State(state): State<CountriesState>) -> Response {
    match state.store.status().await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Status query failed");
            Json(serde_json::json!({ "error": "Internal server error" })).into_response()
        }
    }
}
