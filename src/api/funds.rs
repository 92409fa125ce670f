use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::Program;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsQuery {
    /// One program; all three when absent.
    pub program: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundsResponse {
    pub funds: Vec<FundBalanceDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundBalanceDto {
    pub kind: String,
    pub program: String,
    pub total_collected: String,
    pub total_distributed: String,
    pub available: String,
}

pub async fn get_funds(
    Query(params): Query<FundsQuery>,
    State(state): State<AppState>,
) -> Result<Json<FundsResponse>, AppError> {
    let programs: Vec<Program> = match params.program.as_deref() {
        None => vec![Program::Binary, Program::Matrix, Program::Global],
        Some(raw) => vec![Program::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown program: {}", raw)))?],
    };

    let mut funds = Vec::new();
    for program in programs {
        for fund in state.repo.list_funds(program).await? {
            funds.push(FundBalanceDto {
                kind: fund.kind.as_str().to_string(),
                program: fund.program.as_str().to_string(),
                total_collected: fund.total_collected.to_canonical_string(),
                total_distributed: fund.total_distributed.to_canonical_string(),
                available: fund.available().to_canonical_string(),
            });
        }
    }

    Ok(Json(FundsResponse { funds }))
}
