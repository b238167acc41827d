use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use commune_auth_types::bearer::parse_authorization;
use commune_core::error::ApiError;

use crate::state::AppState;
use crate::usecase::auth::{
    ConfirmEmailUseCase, LoginConfirmUseCase, LoginOutcome, LoginUseCase, OAuthLoginUseCase,
    RefreshTokenUseCase, RegisterInput, RegisterUseCase, TokenPair,
};
use crate::usecase::password::{ForgetPasswordUseCase, ResetPasswordUseCase};

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub access_token_exp: u64,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            access_token_exp: pair.access_token_exp,
            refresh_token: pair.refresh_token,
        }
    }
}

// ── POST /auth/register ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let usecase = RegisterUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    let id = usecase
        .execute(RegisterInput {
            user_name: body.user_name,
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { id: id.to_string() }),
    ))
}

// ── PATCH /auth/confirm-email ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConfirmEmailRequest {
    pub email: String,
    pub code: String,
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Json(body): Json<ConfirmEmailRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = ConfirmEmailUseCase {
        users: state.user_repo(),
    };
    usecase.execute(&body.email, &body.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /auth/login ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub two_step_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenResponse>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let usecase = LoginUseCase {
        users: state.user_repo(),
        secrets: state.secrets.clone(),
        bcrypt_cost: state.bcrypt_cost,
    };
    let response = match usecase.execute(&body.email, &body.password).await? {
        LoginOutcome::Tokens(pair) => LoginResponse {
            two_step_required: false,
            tokens: Some(pair.into()),
        },
        LoginOutcome::TwoStepChallenge => LoginResponse {
            two_step_required: true,
            tokens: None,
        },
    };
    Ok(Json(response))
}

// ── POST /auth/login/confirm ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginConfirmRequest {
    pub email: String,
    pub code: String,
}

pub async fn login_confirm(
    State(state): State<AppState>,
    Json(body): Json<LoginConfirmRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let usecase = LoginConfirmUseCase {
        users: state.user_repo(),
        secrets: state.secrets.clone(),
    };
    let pair = usecase.execute(&body.email, &body.code).await?;
    Ok(Json(pair.into()))
}

// ── POST /auth/refresh ───────────────────────────────────────────────────────

pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("invalid refresh token"))?;
    let line = parse_authorization(header)
        .ok_or_else(|| ApiError::unauthorized("invalid refresh token"))?;

    let usecase = RefreshTokenUseCase {
        users: state.user_repo(),
        secrets: state.secrets.clone(),
    };
    let pair = usecase.execute(line.claimed_role, line.token).await?;
    Ok(Json(pair.into()))
}

// ── POST /auth/forget-password ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ForgetPasswordRequest {
    pub email: String,
}

pub async fn forget_password(
    State(state): State<AppState>,
    Json(body): Json<ForgetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = ForgetPasswordUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    usecase.execute(&body.email).await?;
    Ok(StatusCode::ACCEPTED)
}

// ── PATCH /auth/reset-password ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let usecase = ResetPasswordUseCase {
        users: state.user_repo(),
        bcrypt_cost: state.bcrypt_cost,
    };
    usecase
        .execute(&body.email, &body.code, &body.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── POST /auth/login/google ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OAuthLoginRequest {
    pub id_token: String,
}

pub async fn login_google(
    State(state): State<AppState>,
    Json(body): Json<OAuthLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let usecase = OAuthLoginUseCase {
        users: state.user_repo(),
        identity: state.identity.clone(),
        secrets: state.secrets.clone(),
    };
    let pair = usecase.execute(&body.id_token).await?;
    Ok(Json(pair.into()))
}
