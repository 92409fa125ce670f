use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::{BonusKind, Program, UserId};

/// Structured failures surfaced by the engine's public operations.
///
/// Callers decide user messaging from the variant; none of these leave
/// partial state behind thanks to bounded-scope atomic writes per record.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user {0} not found")]
    UnknownUser(UserId),
    #[error("{requested} requires joining {required} first")]
    SequencingViolation {
        required: Program,
        requested: Program,
    },
    #[error("user {user} already holds slot {slot_no} in {program}")]
    AlreadyJoined {
        user: UserId,
        program: Program,
        slot_no: i64,
    },
    #[error("sponsor {sponsor} holds no active placement in {program}")]
    SponsorNotPlaced { sponsor: UserId, program: Program },
    #[error("no slot {slot_no} in the {program} catalog")]
    UnknownSlot { program: Program, slot_no: i64 },
    #[error("payment {got} does not match {program} slot {slot_no} price {expected}")]
    PriceMismatch {
        program: Program,
        slot_no: i64,
        expected: String,
        got: String,
    },
    #[error("no free position within bounded search depth in {0}")]
    NoCapacity(Program),
    #[error("{kind} fund for {program} cannot cover the distribution")]
    InsufficientFund { kind: BonusKind, program: Program },
    #[error("accrual would exceed the {0} daily cap")]
    CapExceeded(BonusKind),
    #[error("concurrent write conflict persisted past retry limit")]
    WriteConflict,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownUser(_) | EngineError::UnknownSlot { .. } => {
                AppError::NotFound(err.to_string())
            }
            EngineError::SequencingViolation { .. } | EngineError::PriceMismatch { .. } => {
                AppError::BadRequest(err.to_string())
            }
            EngineError::AlreadyJoined { .. }
            | EngineError::SponsorNotPlaced { .. }
            | EngineError::InsufficientFund { .. }
            | EngineError::CapExceeded(_)
            | EngineError::WriteConflict => AppError::Conflict(err.to_string()),
            EngineError::NoCapacity(_) | EngineError::Db(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
