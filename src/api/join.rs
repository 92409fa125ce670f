use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Amount, Program, TimeMs, TxHash, UserId};
use crate::engine::RecycleAction;
use crate::error::AppError;
use crate::orchestration::{process_join, JoinRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    pub tx_hash: String,
    pub user_id: String,
    pub sponsor_id: Option<String>,
    pub program: String,
    pub slot_no: i64,
    /// Paid amount as a decimal string, e.g. "0.0088".
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub replayed: bool,
    pub placement_id: i64,
    pub level: i64,
    pub position: i64,
    pub total_paid: String,
    pub total_missed: String,
    pub commissions: Vec<CommissionDto>,
    pub fund_balances: Vec<FundDto>,
    pub recycles: Vec<RecycleDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    pub amount: String,
    pub kind: String,
    pub level: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missed_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDto {
    pub kind: String,
    pub program: String,
    pub available: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycleDto {
    pub user_id: String,
    pub program: String,
    pub slot_no: i64,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_slot: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<i64>,
}

pub async fn post_join(
    State(state): State<AppState>,
    Json(body): Json<JoinBody>,
) -> Result<Json<JoinResponse>, AppError> {
    let program = Program::parse(&body.program)
        .ok_or_else(|| AppError::BadRequest(format!("unknown program: {}", body.program)))?;
    let amount = Amount::from_str_canonical(&body.amount)
        .map_err(|_| AppError::BadRequest(format!("invalid amount: {}", body.amount)))?;
    if body.tx_hash.trim().is_empty() {
        return Err(AppError::BadRequest("txHash must not be empty".into()));
    }

    let req = JoinRequest {
        tx_hash: TxHash::new(body.tx_hash),
        user_id: UserId::new(body.user_id),
        sponsor_id: body.sponsor_id.map(UserId::new),
        program,
        slot_no: body.slot_no,
        amount,
    };

    let outcome = process_join(&state.repo, &state.config, &req, TimeMs::now()).await?;

    let commissions = outcome
        .commissions
        .into_iter()
        .map(|c| CommissionDto {
            recipient: c.recipient.map(|r| r.as_str().to_string()),
            amount: c.amount.to_canonical_string(),
            kind: c.kind.as_str().to_string(),
            level: c.level,
            status: c.status.as_str().to_string(),
            missed_reason: c.missed_reason.map(|r| r.as_str().to_string()),
        })
        .collect();

    let fund_balances = outcome
        .fund_balances
        .into_iter()
        .map(|f| FundDto {
            kind: f.kind.as_str().to_string(),
            program: f.program.as_str().to_string(),
            available: f.available().to_canonical_string(),
        })
        .collect();

    let recycles = outcome
        .recycles
        .into_iter()
        .map(|r| {
            let (action, next_slot, next_phase, instance) = match r.action {
                RecycleAction::Recycled { instance } => ("recycled", None, None, Some(instance)),
                RecycleAction::Advanced { slot_no, phase } => {
                    ("advanced", Some(slot_no), Some(phase), None)
                }
                RecycleAction::Terminal => ("terminal", None, None, None),
            };
            RecycleDto {
                user_id: r.user_id.as_str().to_string(),
                program: r.program.as_str().to_string(),
                slot_no: r.slot_no,
                action: action.to_string(),
                next_slot,
                next_phase,
                instance,
            }
        })
        .collect();

    Ok(Json(JoinResponse {
        replayed: outcome.replayed,
        placement_id: outcome.placement_id,
        level: outcome.level,
        position: outcome.position,
        total_paid: outcome.total_paid.to_canonical_string(),
        total_missed: outcome.total_missed.to_canonical_string(),
        commissions,
        fund_balances,
        recycles,
    }))
}
