use axum::{
    Json,
    extract::State,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::user::UserRole;

use crate::extract::CurrentUser;
use crate::handlers::post::PostResponse;
use crate::handlers::user::UserResponse;
use crate::state::AppState;
use crate::usecase::admin::{AdminOverviewUseCase, ChangeRoleUseCase};

const ADMIN_TIER: &[UserRole] = &[UserRole::Admin, UserRole::SuperAdmin];

// ── GET /admin ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct OverviewResponse {
    pub users: Vec<UserResponse>,
    pub posts: Vec<PostResponse>,
}

pub async fn overview(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<OverviewResponse>, ApiError> {
    current.require(ADMIN_TIER)?;
    let usecase = AdminOverviewUseCase {
        users: state.user_repo(),
        posts: state.post_repo(),
    };
    let (users, posts) = usecase.execute().await?;
    Ok(Json(OverviewResponse {
        users: users.into_iter().map(Into::into).collect(),
        posts: posts.into_iter().map(Into::into).collect(),
    }))
}

// ── PATCH /admin/role ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChangeRoleRequest {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub async fn change_role(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    current.require(ADMIN_TIER)?;
    let usecase = ChangeRoleUseCase {
        users: state.user_repo(),
    };
    let user = usecase
        .execute(&current.0, body.user_id, body.role)
        .await?;
    Ok(Json(user.into()))
}
