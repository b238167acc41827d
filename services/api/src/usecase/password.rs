//! Password recovery and rotation. Every successful change stamps
//! `credential_changed_at`, revoking all outstanding tokens.

use chrono::Utc;

use commune_core::error::ApiError;

use crate::domain::repository::UserRepository;
use crate::domain::types::{OtpPurpose, User};
use crate::usecase::otp::{IssueOtpUseCase, VerifyOtpUseCase};

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    Ok(())
}

// ── ForgetPassword ───────────────────────────────────────────────────────────

pub struct ForgetPasswordUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> ForgetPasswordUseCase<U> {
    pub async fn execute(&self, email: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;

        let issue_otp = IssueOtpUseCase {
            users: self.users.clone(),
            bcrypt_cost: self.bcrypt_cost,
        };
        issue_otp.execute(&user, OtpPurpose::ResetPassword).await
    }
}

// ── ResetPassword ────────────────────────────────────────────────────────────

pub struct ResetPasswordUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> ResetPasswordUseCase<U> {
    pub async fn execute(&self, email: &str, code: &str, password: &str) -> Result<(), ApiError> {
        validate_password(password)?;
        let user = self
            .users
            .find_active_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;

        let verify = VerifyOtpUseCase {
            users: self.users.clone(),
        };
        verify
            .execute(&user, OtpPurpose::ResetPassword, code)
            .await?
            .into_result()?;

        let password_hash =
            bcrypt::hash(password, self.bcrypt_cost).map_err(|e| ApiError::Internal(e.into()))?;
        self.users
            .set_password(user.id, &password_hash, Utc::now())
            .await
    }
}

// ── UpdatePassword ───────────────────────────────────────────────────────────

pub struct UpdatePasswordUseCase<U: UserRepository> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository> UpdatePasswordUseCase<U> {
    pub async fn execute(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        validate_password(new_password)?;
        let old_ok = match &user.password_hash {
            Some(hash) => {
                bcrypt::verify(old_password, hash).map_err(|e| ApiError::Internal(e.into()))?
            }
            None => false,
        };
        if !old_ok {
            return Err(ApiError::validation("old password not correct"));
        }

        let password_hash = bcrypt::hash(new_password, self.bcrypt_cost)
            .map_err(|e| ApiError::Internal(e.into()))?;
        self.users
            .set_password(user.id, &password_hash, Utc::now())
            .await
    }
}
