use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::user::{Provider, UserRole};

use crate::domain::repository::UserRepository;
use crate::domain::types::{ProfileView, User};
use crate::extract::CurrentUser;
use crate::handlers::read_form;
use crate::state::AppState;
use crate::usecase::account::{
    AcceptFriendRequestUseCase, BlockUserUseCase, CommitEmailChangeUseCase, DeleteAvatarUseCase,
    EnableTwoStepUseCase, GetProfileUseCase, RequestEmailChangeUseCase, RequestTwoStepUseCase,
    SendFriendRequestUseCase, SetAvatarUseCase, UpdateProfileUseCase, ViewProfileUseCase,
};
use crate::usecase::password::UpdatePasswordUseCase;

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub role: UserRole,
    pub provider: Provider,
    pub email_confirmed: bool,
    pub two_step_enabled: bool,
    pub avatar_url: Option<String>,
    #[serde(serialize_with = "commune_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            user_name: user.user_name,
            email: user.email,
            role: user.role,
            provider: user.provider,
            email_confirmed: user.email_confirmed,
            two_step_enabled: user.two_step_enabled,
            avatar_url: user.avatar.map(|a| a.url),
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProfileViewResponse {
    pub viewer_id: String,
    pub visit_count: i32,
    #[serde(serialize_with = "commune_core::serde::to_rfc3339_ms")]
    pub last_visited_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProfileView> for ProfileViewResponse {
    fn from(view: ProfileView) -> Self {
        Self {
            viewer_id: view.viewer_id.to_string(),
            visit_count: view.visit_count,
            last_visited_at: view.last_visited_at,
        }
    }
}

// ── GET /user/profile ────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub viewers: Vec<ProfileViewResponse>,
}

pub async fn get_profile(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let usecase = GetProfileUseCase {
        relations: state.relation_repo(),
    };
    let viewers = usecase.execute(&current.0).await?;
    Ok(Json(ProfileResponse {
        user: current.0.into(),
        viewers: viewers.into_iter().map(Into::into).collect(),
    }))
}

// ── GET /user/profile/{user_id} ──────────────────────────────────────────────

pub async fn view_profile(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let usecase = ViewProfileUseCase {
        users: state.user_repo(),
        relations: state.relation_repo(),
    };
    let profile = usecase.execute(&current.0, user_id).await?;
    Ok(Json(profile.into()))
}

// ── PATCH /user/profile ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub user_name: String,
}

pub async fn update_profile(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = UpdateProfileUseCase {
        users: state.user_repo(),
    };
    usecase.execute(&current.0, &body.user_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /user/email ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
}

pub async fn request_email_change(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ChangeEmailRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = RequestEmailChangeUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    usecase.execute(&current.0, &body.email).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── PATCH /user/email/confirm ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConfirmEmailChangeRequest {
    pub current_code: String,
    pub new_code: String,
}

pub async fn confirm_email_change(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ConfirmEmailChangeRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = CommitEmailChangeUseCase {
        users: state.user_repo(),
    };
    usecase
        .execute(&current.0, &body.current_code, &body.new_code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /user/password ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub password: String,
}

pub async fn update_password(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = UpdatePasswordUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    usecase
        .execute(&current.0, &body.old_password, &body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /user/two-step ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RequestTwoStepRequest {
    pub password: String,
}

pub async fn request_two_step(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<RequestTwoStepRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = RequestTwoStepUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    usecase.execute(&current.0, &body.password).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── PATCH /user/two-step ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct EnableTwoStepRequest {
    pub code: String,
}

pub async fn enable_two_step(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<EnableTwoStepRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = EnableTwoStepUseCase {
        users: state.user_repo(),
    };
    usecase.execute(&current.0, &body.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /user/block ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct BlockUserRequest {
    pub email: String,
}

pub async fn block_user(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<BlockUserRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = BlockUserUseCase {
        users: state.user_repo(),
        relations: state.relation_repo(),
    };
    usecase.execute(&current.0, &body.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /user/friend-request/{friend_id} ────────────────────────────────────

pub async fn send_friend_request(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(friend_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let usecase = SendFriendRequestUseCase {
        users: state.user_repo(),
        relations: state.relation_repo(),
    };
    usecase.execute(&current.0, friend_id).await?;
    Ok(StatusCode::CREATED)
}

// ── POST /user/friend-request/{friend_id}/accept ─────────────────────────────

pub async fn accept_friend_request(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(friend_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let usecase = AcceptFriendRequestUseCase {
        relations: state.relation_repo(),
    };
    usecase.execute(&current.0, friend_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /user/avatar ────────────────────────────────────────────────────────

pub async fn upload_avatar(
    current: CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = read_form(multipart).await?;
    let data = form
        .images
        .pop()
        .ok_or_else(|| ApiError::validation("image is required"))?;

    let usecase = SetAvatarUseCase {
        users: state.user_repo(),
        images: state.image_store.clone(),
    };
    usecase.execute(&current.0, data).await?;

    let user = state
        .user_repo()
        .find_active_by_id(current.0.id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(UserResponse::from(user)))
}

// ── DELETE /user/avatar ──────────────────────────────────────────────────────

pub async fn delete_avatar(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let usecase = DeleteAvatarUseCase {
        users: state.user_repo(),
        images: state.image_store.clone(),
    };
    usecase.execute(&current.0).await?;
    Ok(StatusCode::NO_CONTENT)
}
