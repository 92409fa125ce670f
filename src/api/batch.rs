use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::TimeMs;
use crate::engine::{accumulate_missed, distribute_accumulated};
use crate::error::AppError;
use crate::orchestration::run_daily;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyResponse {
    pub day: String,
    pub replayed: bool,
    pub users_processed: i64,
    pub stipend_accrued: String,
    pub total_paid: String,
    pub skipped: Vec<String>,
}

pub async fn post_daily(State(state): State<AppState>) -> Result<Json<DailyResponse>, AppError> {
    let report = run_daily(&state.repo, &state.config, TimeMs::now()).await?;

    Ok(Json(DailyResponse {
        day: report.day,
        replayed: report.replayed,
        users_processed: report.users_processed,
        stipend_accrued: report.stipend_accrued.to_canonical_string(),
        total_paid: report.total_paid.to_canonical_string(),
        skipped: report.skipped,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulateBody {
    pub from_ms: i64,
    pub to_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulateResponse {
    pub swept: usize,
    pub groups: usize,
    pub total: String,
}

pub async fn post_accumulate(
    State(state): State<AppState>,
    Json(body): Json<AccumulateBody>,
) -> Result<Json<AccumulateResponse>, AppError> {
    if body.from_ms >= body.to_ms {
        return Err(AppError::BadRequest("fromMs must be < toMs".into()));
    }

    let report = accumulate_missed(
        &state.repo,
        &state.config,
        TimeMs::new(body.from_ms),
        TimeMs::new(body.to_ms),
        TimeMs::now(),
    )
    .await?;

    Ok(Json(AccumulateResponse {
        swept: report.swept,
        groups: report.groups,
        total: report.total.to_canonical_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeBody {
    /// Payout period label, e.g. "2024-01-15"; today when absent.
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeResponse {
    pub period: String,
    pub pools: usize,
    pub recipients: usize,
    pub total_distributed: String,
    pub skipped: Vec<String>,
}

pub async fn post_distribute(
    State(state): State<AppState>,
    Json(body): Json<DistributeBody>,
) -> Result<Json<DistributeResponse>, AppError> {
    let now = TimeMs::now();
    let period = body.period.unwrap_or_else(|| now.utc_day());

    let report = distribute_accumulated(&state.repo, &state.config, &period, now).await?;

    Ok(Json(DistributeResponse {
        period: report.period,
        pools: report.pools,
        recipients: report.recipients,
        total_distributed: report.total_distributed.to_canonical_string(),
        skipped: report.skipped,
    }))
}
