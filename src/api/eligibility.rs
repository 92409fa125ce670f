use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{BonusKind, TimeMs, UserId};
use crate::engine::trackers;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityQuery {
    pub user: String,
    /// Limit the refresh to one bonus kind; all kinds when absent.
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub user: String,
    pub reports: Vec<ReportDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDto {
    pub kind: String,
    pub is_eligible: bool,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_tier: Option<String>,
    pub pending_amount: String,
}

/// Recomputes eligibility from current facts; reading is also a refresh.
pub async fn get_eligibility(
    Query(params): Query<EligibilityQuery>,
    State(state): State<AppState>,
) -> Result<Json<EligibilityResponse>, AppError> {
    let user = UserId::new(params.user.clone());
    if state.repo.get_user(&user).await?.is_none() {
        return Err(AppError::NotFound(format!("user {} not found", params.user)));
    }

    let kinds: Vec<BonusKind> = match params.kind.as_deref() {
        None => BonusKind::all().to_vec(),
        Some(raw) => vec![BonusKind::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown bonus kind: {}", raw)))?],
    };

    let now = TimeMs::now();
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let report =
            trackers::check_eligibility(&state.repo, &state.config, &user, kind, now).await?;
        reports.push(ReportDto {
            kind: report.kind.as_str().to_string(),
            is_eligible: report.is_eligible,
            reasons: report.reasons,
            current_tier: report.current_tier,
            pending_amount: report.pending_amount.to_canonical_string(),
        });
    }

    Ok(Json(EligibilityResponse {
        user: params.user,
        reports,
    }))
}
