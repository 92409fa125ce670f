pub mod batch;
pub mod eligibility;
pub mod funds;
pub mod health;
pub mod join;
pub mod users;

use crate::config::Config;
use crate::db::Repository;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self { repo, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/users", post(users::create_user))
        .route("/v1/users/:id", get(users::get_user))
        .route("/v1/join", post(join::post_join))
        .route("/v1/eligibility", get(eligibility::get_eligibility))
        .route("/v1/funds", get(funds::get_funds))
        .route("/v1/batch/daily", post(batch::post_daily))
        .route("/v1/batch/missed/accumulate", post(batch::post_accumulate))
        .route("/v1/batch/missed/distribute", post(batch::post_distribute))
        .layer(cors)
        .with_state(state)
}
