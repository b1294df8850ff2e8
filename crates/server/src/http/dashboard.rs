use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use gst_contracts::{
    ChartData, SampleCollection, SamplesResponse, SponsorsResponse, StudiesResponse,
};
use serde::Deserialize;

use super::{ApiError, AppState, json_error, observed};
use crate::filter;

type NoCache = [(header::HeaderName, &'static str); 1];

const NO_CACHE: NoCache = [(header::CACHE_CONTROL, "no-cache")];

#[derive(Debug, Default, Deserialize)]
pub(super) struct SelectionQuery {
    #[serde(default)]
    sponsor: String,
    #[serde(default)]
    study: String,
}

impl SelectionQuery {
    fn is_complete(&self) -> bool {
        !self.sponsor.is_empty() && !self.study.is_empty()
    }
}

fn selection(query: Result<Query<SelectionQuery>, QueryRejection>) -> Result<SelectionQuery, ApiError> {
    query.map(|Query(q)| q).map_err(|rejection| {
        json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            format!("invalid query string: {}", rejection.body_text()),
            false,
        )
    })
}

/// Waits on the cache, bounded by the configured provider timeout. A timed-out
/// wait leaves the refresh running for later requests.
async fn load_samples(state: &AppState) -> Result<Arc<SampleCollection>, ApiError> {
    let lookup = state.cache.get_samples();
    let result = match state.config.provider_timeout {
        Some(limit) => tokio::time::timeout(limit, lookup).await.map_err(|_| {
            json_error(
                StatusCode::GATEWAY_TIMEOUT,
                "ERR_SOURCE_TIMEOUT",
                "sample data is still loading; retry shortly",
                true,
            )
        })?,
        None => lookup.await,
    };

    result.map_err(|err| {
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_SOURCE_UNAVAILABLE",
            format!("error retrieving sample data: {}", err),
            true,
        )
    })
}

pub(super) async fn filters(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(NoCache, Json<SponsorsResponse>), ApiError> {
    observed("/api/filters", &headers, async {
        let collection = load_samples(&state).await?;
        let faculty_sponsors = filter::unique_sponsors(&collection.samples);
        tracing::debug!(
            samples = collection.len(),
            sponsors = faculty_sponsors.len(),
            "dashboard.filters"
        );
        Ok((NO_CACHE, Json(SponsorsResponse { faculty_sponsors })))
    })
    .await
}

pub(super) async fn studies(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<(NoCache, Json<StudiesResponse>), ApiError> {
    observed("/api/studies", &headers, async {
        let query = selection(query)?;
        if query.sponsor.is_empty() {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "ERR_INVALID_PARAMS",
                "sponsor parameter is required",
                false,
            ));
        }

        let collection = load_samples(&state).await?;
        let studies = filter::studies_for_sponsor(&collection.samples, &query.sponsor);
        Ok((NO_CACHE, Json(StudiesResponse { studies })))
    })
    .await
}

pub(super) async fn samples(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<Json<SamplesResponse>, ApiError> {
    observed("/api/samples", &headers, async {
        let query = selection(query)?;
        if !query.is_complete() {
            return Ok(Json(SamplesResponse {
                has_data: false,
                samples: Vec::new(),
            }));
        }

        let collection = load_samples(&state).await?;
        let samples = filter::filter_samples(&collection.samples, &query.sponsor, &query.study);
        Ok(Json(SamplesResponse {
            has_data: true,
            samples,
        }))
    })
    .await
}

pub(super) async fn chart(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<SelectionQuery>, QueryRejection>,
) -> Result<Json<ChartData>, ApiError> {
    observed("/api/chart", &headers, async {
        let query = selection(query)?;
        if !query.is_complete() {
            return Ok(Json(filter::chart_series(&[])));
        }

        let collection = load_samples(&state).await?;
        let selected = filter::filter_samples(&collection.samples, &query.sponsor, &query.study);
        Ok(Json(filter::chart_series(&selected)))
    })
    .await
}
