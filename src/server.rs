//! Thin HTTP handlers over the core services. Handlers parse and authorize,
//! then delegate; every response is a structured JSON success/failure body
//! and nothing panics past this boundary.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::types::{DrawResult, WeeklyStats};
use crate::use_cases::{CloseOutcome, ParticipationService, ResultService, StatsService};

pub struct AppState {
    pub participations: ParticipationService,
    pub results: Arc<ResultService>,
    pub stats: StatsService,
    pub cron_secret: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lotto", get(get_lotto))
        .route(
            "/api/participations",
            post(submit_participation)
                .get(list_participations)
                .delete(delete_participations),
        )
        .route("/api/participations/count", get(participant_count))
        .route("/api/calculate-results", post(calculate_results))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/recent", get(recent_stats))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct RoundQuery {
    round: Option<String>,
}

/// Accepts a round number or "latest" (also the default when absent).
fn parse_round(raw: &Option<String>) -> AppResult<Option<u32>> {
    match raw.as_deref() {
        None | Some("") | Some("latest") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| AppError::InvalidRound(s.to_string())),
    }
}

async fn get_lotto(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoundQuery>,
) -> AppResult<Json<DrawResult>> {
    let round = parse_round(&query.round)?;
    Ok(Json(state.results.resolve(round).await?))
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    device_id: String,
    numbers: Vec<u8>,
    round: Option<u32>,
}

async fn submit_participation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<Value>> {
    let outcome = state
        .participations
        .submit(&req.device_id, req.round, req.numbers)
        .await?;
    Ok(Json(json!({
        "success": outcome.accepted(),
        "round": outcome.round(),
        "message": outcome.message(),
    })))
}

#[derive(Debug, Deserialize)]
struct DeviceQuery {
    device_id: String,
    limit: Option<u32>,
}

async fn list_participations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> AppResult<Json<Value>> {
    let limit = query.limit.unwrap_or(10);
    let participations = state
        .participations
        .list_own(&query.device_id, limit)
        .await?;
    Ok(Json(json!({
        "success": true,
        "participations": participations,
    })))
}

async fn delete_participations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeviceQuery>,
) -> AppResult<Json<Value>> {
    let count = state.participations.delete_own(&query.device_id).await?;
    Ok(Json(json!({
        "success": true,
        "count": count,
    })))
}

async fn participant_count(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoundQuery>,
) -> AppResult<Json<Value>> {
    let round = parse_round(&query.round)?;
    let (round, participants) = state.participations.participant_count(round).await?;
    Ok(Json(json!({
        "success": true,
        "round": round,
        "participants": participants,
    })))
}

async fn calculate_results(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RoundQuery>,
) -> AppResult<Json<Value>> {
    authorize(&state.cron_secret, &headers)?;

    let round = parse_round(&query.round)?;
    let body = match state.stats.close_round(round).await? {
        CloseOutcome::Closed(stats) => json!({
            "success": true,
            "message": "calculation complete",
            "round": stats.round,
            "stats": stats,
        }),
        CloseOutcome::AlreadyClosed(stats) => json!({
            "success": true,
            "message": "already calculated",
            "round": stats.round,
            "stats": stats,
        }),
        CloseOutcome::NoParticipants { round } => json!({
            "success": true,
            "message": "no participations for this round",
            "round": round,
            "total_participants": 0,
        }),
    };
    Ok(Json(body))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoundQuery>,
) -> AppResult<Json<WeeklyStats>> {
    let round = parse_round(&query.round)?
        .ok_or_else(|| AppError::InvalidRound("a round number is required".to_string()))?;
    let stats = state
        .stats
        .get_stats(round)
        .await?
        .ok_or(AppError::StatsNotFound(round))?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<u32>,
}

async fn recent_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Value>> {
    let stats = state.stats.recent_stats(query.limit.unwrap_or(5)).await?;
    Ok(Json(json!({
        "success": true,
        "stats": stats,
    })))
}

/// The scheduled-trigger guard: enforced only when a secret is configured.
fn authorize(secret: &Option<String>, headers: &HeaderMap) -> AppResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if provided == Some(format!("Bearer {secret}").as_str()) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}
