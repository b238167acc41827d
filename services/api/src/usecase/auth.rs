//! Registration, login, token exchange, and OAuth provisioning.

use chrono::Utc;
use uuid::Uuid;

use commune_auth_types::secrets::{SecretTier, TokenKind, TokenSecrets};
use commune_auth_types::token::{issue_token, revoked_by_credential_change, validate_token_info};
use commune_core::error::ApiError;
use commune_domain::user::{Provider, UserRole};

use crate::domain::repository::{IdentityProvider, UserRepository};
use crate::domain::types::{
    OTP_MAX_ATTEMPTS, OtpPurpose, OtpState, User, validate_email, validate_user_name,
};
use crate::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};

/// Freshly issued access + refresh tokens.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_exp: u64,
    pub refresh_token: String,
}

pub(crate) fn issue_token_pair(user: &User, secrets: &TokenSecrets) -> Result<TokenPair, ApiError> {
    let (access_token, access_token_exp) =
        issue_token(user.id, user.role, TokenKind::Access, secrets)
            .map_err(|e| ApiError::Internal(e.into()))?;
    let (refresh_token, _) = issue_token(user.id, user.role, TokenKind::Refresh, secrets)
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(TokenPair {
        access_token,
        access_token_exp,
        refresh_token,
    })
}

// ── Register ─────────────────────────────────────────────────────────────────

pub struct RegisterInput {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

pub struct RegisterUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> RegisterUseCase<U> {
    pub async fn execute(&self, input: RegisterInput) -> Result<Uuid, ApiError> {
        if !validate_user_name(&input.user_name) {
            return Err(ApiError::validation("user name must be 3-30 characters"));
        }
        if !validate_email(&input.email) {
            return Err(ApiError::validation("invalid email address"));
        }
        if input.password.chars().count() < 8 {
            return Err(ApiError::validation("password must be at least 8 characters"));
        }

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(ApiError::conflict("user already exists"));
        }

        let password_hash = bcrypt::hash(&input.password, self.bcrypt_cost)
            .map_err(|e| ApiError::Internal(e.into()))?;
        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7(),
            user_name: input.user_name,
            email: input.email,
            password_hash: Some(password_hash),
            role: UserRole::User,
            provider: Provider::System,
            email_confirmed: false,
            two_step_enabled: false,
            is_deleted: false,
            temp_email: None,
            avatar: None,
            credential_changed_at: None,
            otp: OtpState {
                attempts: OTP_MAX_ATTEMPTS,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        };
        self.users.create(&user).await?;

        let issue_otp = IssueOtpUseCase {
            users: self.users.clone(),
            bcrypt_cost: self.bcrypt_cost,
        };
        issue_otp.execute(&user, OtpPurpose::ConfirmEmail).await?;

        Ok(user.id)
    }
}

// ── ConfirmEmail ─────────────────────────────────────────────────────────────

pub struct ConfirmEmailUseCase<U: UserRepository + Clone> {
    pub users: U,
}

impl<U: UserRepository + Clone> ConfirmEmailUseCase<U> {
    pub async fn execute(&self, email: &str, code: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if user.email_confirmed {
            return Err(ApiError::conflict("email already verified"));
        }

        let verify = VerifyOtpUseCase {
            users: self.users.clone(),
        };
        verify
            .execute(&user, OtpPurpose::ConfirmEmail, code)
            .await?
            .into_result()?;

        self.users.set_email_confirmed(user.id).await
    }
}

// ── Login ────────────────────────────────────────────────────────────────────

/// A password login either yields tokens directly or, for 2-step accounts,
/// dispatches a code and asks the caller to confirm.
#[derive(Debug)]
pub enum LoginOutcome {
    Tokens(TokenPair),
    TwoStepChallenge,
}

pub struct LoginUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub secrets: TokenSecrets,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> LoginUseCase<U> {
    pub async fn execute(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if !user.email_confirmed {
            return Err(ApiError::unauthorized("please confirm your email first"));
        }
        let password_ok = match &user.password_hash {
            Some(hash) => {
                bcrypt::verify(password, hash).map_err(|e| ApiError::Internal(e.into()))?
            }
            // OAuth-provisioned accounts carry no password.
            None => false,
        };
        if !password_ok {
            return Err(ApiError::validation("invalid password"));
        }

        if user.two_step_enabled {
            let issue_otp = IssueOtpUseCase {
                users: self.users.clone(),
                bcrypt_cost: self.bcrypt_cost,
            };
            issue_otp.execute(&user, OtpPurpose::ConfirmEmail).await?;
            return Ok(LoginOutcome::TwoStepChallenge);
        }

        Ok(LoginOutcome::Tokens(issue_token_pair(&user, &self.secrets)?))
    }
}

// ── LoginConfirm (2-step) ────────────────────────────────────────────────────

pub struct LoginConfirmUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub secrets: TokenSecrets,
}

impl<U: UserRepository + Clone> LoginConfirmUseCase<U> {
    pub async fn execute(&self, email: &str, code: &str) -> Result<TokenPair, ApiError> {
        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;

        let verify = VerifyOtpUseCase {
            users: self.users.clone(),
        };
        verify
            .execute(&user, OtpPurpose::ConfirmEmail, code)
            .await?
            .into_result()?;

        issue_token_pair(&user, &self.secrets)
    }
}

// ── RefreshToken ─────────────────────────────────────────────────────────────

pub struct RefreshTokenUseCase<U: UserRepository> {
    pub users: U,
    pub secrets: TokenSecrets,
}

impl<U: UserRepository> RefreshTokenUseCase<U> {
    /// Validate the refresh token for the claimed tier and re-issue both
    /// tokens. The credential-change stamp revokes older refresh tokens
    /// without any revocation list.
    pub async fn execute(
        &self,
        claimed_role: UserRole,
        refresh_token: &str,
    ) -> Result<TokenPair, ApiError> {
        let secret = self
            .secrets
            .select(SecretTier::for_role(claimed_role), TokenKind::Refresh);
        let info = validate_token_info(refresh_token, secret)
            .map_err(|_| ApiError::unauthorized("invalid refresh token"))?;

        let user = self
            .users
            .find_active_by_id(info.user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("invalid refresh token"))?;

        if revoked_by_credential_change(info.issued_at, user.credential_changed_at) {
            return Err(ApiError::unauthorized("token revoked, sign in again"));
        }

        issue_token_pair(&user, &self.secrets)
    }
}

// ── OAuthLogin ───────────────────────────────────────────────────────────────

pub struct OAuthLoginUseCase<U: UserRepository, P: IdentityProvider> {
    pub users: U,
    pub identity: P,
    pub secrets: TokenSecrets,
}

impl<U: UserRepository, P: IdentityProvider> OAuthLoginUseCase<U, P> {
    pub async fn execute(&self, id_token: &str) -> Result<TokenPair, ApiError> {
        let claims = self.identity.verify(id_token).await?;
        if !claims.email_verified {
            return Err(ApiError::unauthorized("email not verified"));
        }

        let existing = self.users.find_active_by_email(&claims.email).await?;
        if let Some(ref user) = existing {
            // A password account under the same address cannot be taken over
            // via OAuth.
            if user.provider == Provider::System {
                return Err(ApiError::conflict("user already exists"));
            }
        }

        let user = match existing {
            Some(user) => user,
            None => {
                let now = Utc::now();
                let user = User {
                    id: Uuid::now_v7(),
                    user_name: claims.name,
                    email: claims.email,
                    password_hash: None,
                    role: UserRole::User,
                    provider: Provider::Google,
                    email_confirmed: true,
                    two_step_enabled: false,
                    is_deleted: false,
                    temp_email: None,
                    avatar: None,
                    credential_changed_at: None,
                    otp: OtpState {
                        attempts: OTP_MAX_ATTEMPTS,
                        ..Default::default()
                    },
                    created_at: now,
                    updated_at: now,
                };
                self.users.create(&user).await?;
                user
            }
        };

        issue_token_pair(&user, &self.secrets)
    }
}
