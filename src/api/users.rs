use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Role, TimeMs, User, UserId, Wallet};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Caller-chosen id; generated when absent.
    pub id: Option<String>,
    pub sponsor_id: Option<String>,
    pub wallet: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_id: Option<String>,
    pub wallet: String,
    pub role: String,
    pub binary_joined: bool,
    pub matrix_joined: bool,
    pub global_joined: bool,
    pub created_at: i64,
}

fn to_dto(user: User) -> UserDto {
    UserDto {
        id: user.id.as_str().to_string(),
        sponsor_id: user.sponsor_id.map(|s| s.as_str().to_string()),
        wallet: user.wallet.as_str().to_string(),
        role: user.role.as_str().to_string(),
        binary_joined: user.binary_joined,
        matrix_joined: user.matrix_joined,
        global_joined: user.global_joined,
        created_at: user.created_at.as_i64(),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserDto>, AppError> {
    if req.wallet.trim().is_empty() {
        return Err(AppError::BadRequest("wallet must not be empty".into()));
    }

    let id = match req.id {
        Some(id) if !id.trim().is_empty() => id,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let role = match req.role.as_deref() {
        None => Role::Normal,
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown role: {}", raw)))?,
    };

    if let Some(sponsor) = &req.sponsor_id {
        if state
            .repo
            .get_user(&UserId::new(sponsor.clone()))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!("sponsor {} not found", sponsor)));
        }
    }

    let user = User {
        id: UserId::new(id),
        sponsor_id: req.sponsor_id.map(UserId::new),
        wallet: Wallet::new(req.wallet),
        role,
        binary_joined: false,
        matrix_joined: false,
        global_joined: false,
        binary_joined_at: None,
        matrix_joined_at: None,
        global_joined_at: None,
        created_at: TimeMs::now(),
    };

    if !state.repo.insert_user(&user).await? {
        return Err(AppError::Conflict(format!(
            "user {} already exists",
            user.id
        )));
    }

    Ok(Json(to_dto(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .repo
        .get_user(&UserId::new(id.clone()))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {} not found", id)))?;

    Ok(Json(to_dto(user)))
}
