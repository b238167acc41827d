//! One-time-code issue and verification with bounded retry and cooldown.

use chrono::{Duration, Utc};
use rand::RngExt;
use serde_json::json;
use uuid::Uuid;

use commune_core::error::ApiError;

use crate::domain::repository::UserRepository;
use crate::domain::types::{
    OTP_CODE_LEN, OTP_COOLDOWN_SECS, OTP_MAX_ATTEMPTS, OTP_TTL_SECS, OtpPurpose, OutboxEvent, User,
};

const DIGITS: &[u8] = b"0123456789";

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..OTP_CODE_LEN)
        .map(|_| DIGITS[rng.random_range(0..DIGITS.len())] as char)
        .collect()
}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpVerdict {
    Ok,
    Invalid,
    Expired,
    RateLimited { retry_after_secs: i64 },
}

impl OtpVerdict {
    /// Collapse the verdict into the handler-facing error mapping.
    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            Self::Ok => Ok(()),
            Self::Invalid => Err(ApiError::unauthorized("invalid code")),
            Self::Expired => Err(ApiError::unauthorized("code expired")),
            Self::RateLimited { retry_after_secs } => {
                Err(ApiError::RateLimited { retry_after_secs })
            }
        }
    }
}

// ── IssueOtp ─────────────────────────────────────────────────────────────────

pub struct IssueOtpUseCase<U: UserRepository> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository> IssueOtpUseCase<U> {
    /// Generate a code, store its hash with a fresh expiry, and enqueue the
    /// matching email outbox event in one repository transaction.
    pub async fn execute(&self, user: &User, purpose: OtpPurpose) -> Result<(), ApiError> {
        // A change-email code goes to the pending address, everything else
        // to the account address.
        let recipient = match purpose {
            OtpPurpose::ChangeEmail => user
                .temp_email
                .clone()
                .ok_or_else(|| ApiError::validation("no pending email change"))?,
            _ => user.email.clone(),
        };

        let code = generate_code();
        let code_hash =
            bcrypt::hash(&code, self.bcrypt_cost).map_err(|e| ApiError::Internal(e.into()))?;
        let expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECS);

        let event_id = Uuid::new_v4();
        let event = OutboxEvent {
            id: event_id,
            kind: purpose.event_kind().to_owned(),
            payload: json!({
                "email": recipient,
                "user_name": user.user_name,
                "code": code,
            }),
            idempotency_key: format!("{}:{event_id}", purpose.event_kind()),
        };

        self.users
            .store_otp(user.id, purpose, &code_hash, expires_at, &event)
            .await
    }
}

// ── VerifyOtp ────────────────────────────────────────────────────────────────

/// Result of the attempt-throttle preamble: either the effective budget for
/// this attempt, or an early rate-limit rejection.
enum Throttle {
    Proceed { attempts: i16 },
    Limited(OtpVerdict),
}

/// The attempt-limiting state machine, run before any code is checked.
///
/// The budget and cooldown are shared across all purposes: exhausting one
/// flow blocks the others until the cooldown elapses.
async fn check_attempts<U: UserRepository>(users: &U, user: &User) -> Result<Throttle, ApiError> {
    let now = Utc::now();

    // Budget exhausted with no cooldown yet: start one and reject.
    if user.otp.attempts <= 0 && user.otp.cooldown_until.is_none() {
        let until = now + Duration::seconds(OTP_COOLDOWN_SECS);
        users.set_otp_cooldown(user.id, until).await?;
        return Ok(Throttle::Limited(OtpVerdict::RateLimited {
            retry_after_secs: OTP_COOLDOWN_SECS,
        }));
    }

    let mut attempts = user.otp.attempts;
    if let Some(cooldown_until) = user.otp.cooldown_until {
        if cooldown_until > now {
            return Ok(Throttle::Limited(OtpVerdict::RateLimited {
                retry_after_secs: (cooldown_until - now).num_seconds().max(1),
            }));
        }
        // Cooldown elapsed: restore the budget and continue with this attempt.
        users.reset_otp_attempts(user.id).await?;
        attempts = OTP_MAX_ATTEMPTS;
    }

    Ok(Throttle::Proceed { attempts })
}

fn hash_matches(submitted: &str, stored: Option<&str>) -> Result<bool, ApiError> {
    match stored {
        Some(hash) => bcrypt::verify(submitted, hash).map_err(|e| ApiError::Internal(e.into())),
        None => Ok(false),
    }
}

pub struct VerifyOtpUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> VerifyOtpUseCase<U> {
    /// Run the throttle preamble, then check the submitted code against the
    /// purpose's stored hash and the shared expiry. Either failure burns one
    /// attempt; success clears the purpose's state.
    pub async fn execute(
        &self,
        user: &User,
        purpose: OtpPurpose,
        submitted: &str,
    ) -> Result<OtpVerdict, ApiError> {
        let attempts = match check_attempts(&self.users, user).await? {
            Throttle::Proceed { attempts } => attempts,
            Throttle::Limited(verdict) => return Ok(verdict),
        };

        if !hash_matches(submitted, user.otp.code_for(purpose))? {
            self.users
                .set_otp_attempts(user.id, (attempts - 1).max(0))
                .await?;
            return Ok(OtpVerdict::Invalid);
        }

        if user.otp.expires_at.is_none_or(|t| t < Utc::now()) {
            self.users
                .set_otp_attempts(user.id, (attempts - 1).max(0))
                .await?;
            return Ok(OtpVerdict::Expired);
        }

        self.users.clear_otp(user.id, purpose).await?;
        Ok(OtpVerdict::Ok)
    }
}

// ── VerifyEmailChange ────────────────────────────────────────────────────────

pub struct VerifyEmailChangeUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> VerifyEmailChangeUseCase<U> {
    /// Check the pair of codes an email change requires (one sent to the
    /// current address, one to the pending address) under a single throttle
    /// pass. Success does NOT clear OTP state here: committing the change
    /// wipes it together with the address swap.
    pub async fn execute(
        &self,
        user: &User,
        current_code: &str,
        pending_code: &str,
    ) -> Result<OtpVerdict, ApiError> {
        let attempts = match check_attempts(&self.users, user).await? {
            Throttle::Proceed { attempts } => attempts,
            Throttle::Limited(verdict) => return Ok(verdict),
        };

        let both_match = hash_matches(current_code, user.otp.code_for(OtpPurpose::ConfirmEmail))?
            && hash_matches(pending_code, user.otp.code_for(OtpPurpose::ChangeEmail))?;
        if !both_match {
            self.users
                .set_otp_attempts(user.id, (attempts - 1).max(0))
                .await?;
            return Ok(OtpVerdict::Invalid);
        }

        if user.otp.expires_at.is_none_or(|t| t < Utc::now()) {
            self.users
                .set_otp_attempts(user.id, (attempts - 1).max(0))
                .await?;
            return Ok(OtpVerdict::Expired);
        }

        Ok(OtpVerdict::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::testing::{MemoryUsers, test_user};

    const TEST_COST: u32 = 4;

    fn issued_user(users: &MemoryUsers, code: &str, purpose: OtpPurpose) -> User {
        let mut user = test_user();
        let hash = bcrypt::hash(code, TEST_COST).unwrap();
        match purpose {
            OtpPurpose::ConfirmEmail => user.otp.confirm_email_code = Some(hash),
            OtpPurpose::ResetPassword => user.otp.reset_password_code = Some(hash),
            OtpPurpose::ChangeEmail => user.otp.change_email_code = Some(hash),
        }
        user.otp.expires_at = Some(Utc::now() + Duration::seconds(OTP_TTL_SECS));
        user.otp.attempts = OTP_MAX_ATTEMPTS;
        users.insert(user.clone());
        user
    }

    #[test]
    fn should_generate_six_decimal_digits() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn should_store_hash_expiry_and_outbox_event_on_issue() {
        let users = MemoryUsers::default();
        let user = test_user();
        users.insert(user.clone());

        let usecase = IssueOtpUseCase {
            users: users.clone(),
            bcrypt_cost: TEST_COST,
        };
        usecase
            .execute(&user, OtpPurpose::ConfirmEmail)
            .await
            .unwrap();

        let stored = users.get(user.id);
        assert!(stored.otp.confirm_email_code.is_some());
        assert!(stored.otp.expires_at.unwrap() > Utc::now());

        let events = users.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "verify_email_code");
        assert_eq!(events[0].payload["email"], stored.email);
        // The plain code is dispatched out-of-band, never stored.
        let code = events[0].payload["code"].as_str().unwrap();
        assert_ne!(code, stored.otp.confirm_email_code.as_deref().unwrap());
        assert!(bcrypt::verify(code, stored.otp.confirm_email_code.as_deref().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn should_send_change_email_code_to_the_pending_address() {
        let users = MemoryUsers::default();
        let mut user = test_user();
        user.temp_email = Some("new@example.com".into());
        users.insert(user.clone());

        let usecase = IssueOtpUseCase {
            users: users.clone(),
            bcrypt_cost: TEST_COST,
        };
        usecase
            .execute(&user, OtpPurpose::ChangeEmail)
            .await
            .unwrap();

        let events = users.events();
        assert_eq!(events[0].payload["email"], "new@example.com");
    }

    #[tokio::test]
    async fn should_reject_change_email_issue_without_pending_address() {
        let users = MemoryUsers::default();
        let user = test_user();
        users.insert(user.clone());

        let usecase = IssueOtpUseCase {
            users,
            bcrypt_cost: TEST_COST,
        };
        let err = usecase
            .execute(&user, OtpPurpose::ChangeEmail)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn should_accept_a_correct_code_and_clear_state() {
        let users = MemoryUsers::default();
        let user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        let verdict = usecase
            .execute(&user, OtpPurpose::ConfirmEmail, "123456")
            .await
            .unwrap();
        assert_eq!(verdict, OtpVerdict::Ok);

        let stored = users.get(user.id);
        assert_eq!(stored.otp.confirm_email_code, None);
        assert_eq!(stored.otp.expires_at, None);
        assert_eq!(stored.otp.cooldown_until, None);
        assert_eq!(stored.otp.attempts, OTP_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn should_decrement_attempts_on_a_wrong_code() {
        let users = MemoryUsers::default();
        let user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        let verdict = usecase
            .execute(&user, OtpPurpose::ConfirmEmail, "000000")
            .await
            .unwrap();
        assert_eq!(verdict, OtpVerdict::Invalid);
        assert_eq!(users.get(user.id).otp.attempts, OTP_MAX_ATTEMPTS - 1);
    }

    #[tokio::test]
    async fn should_reject_an_expired_code_and_decrement() {
        let users = MemoryUsers::default();
        let mut user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);
        user.otp.expires_at = Some(Utc::now() - Duration::seconds(1));
        users.insert(user.clone());

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        let verdict = usecase
            .execute(&user, OtpPurpose::ConfirmEmail, "123456")
            .await
            .unwrap();
        assert_eq!(verdict, OtpVerdict::Expired);
        assert_eq!(users.get(user.id).otp.attempts, OTP_MAX_ATTEMPTS - 1);
    }

    #[tokio::test]
    async fn should_rate_limit_the_sixth_attempt_and_set_a_cooldown() {
        let users = MemoryUsers::default();
        let user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        for _ in 0..5 {
            let current = users.get(user.id);
            let verdict = usecase
                .execute(&current, OtpPurpose::ConfirmEmail, "000000")
                .await
                .unwrap();
            assert_eq!(verdict, OtpVerdict::Invalid);
        }
        assert_eq!(users.get(user.id).otp.attempts, 0);

        let current = users.get(user.id);
        let verdict = usecase
            .execute(&current, OtpPurpose::ConfirmEmail, "000000")
            .await
            .unwrap();
        assert!(matches!(verdict, OtpVerdict::RateLimited { .. }));
        assert!(users.get(user.id).otp.cooldown_until.is_some());
    }

    #[tokio::test]
    async fn should_rate_limit_every_attempt_during_cooldown() {
        let users = MemoryUsers::default();
        let mut user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);
        user.otp.attempts = 0;
        user.otp.cooldown_until = Some(Utc::now() + Duration::seconds(200));
        users.insert(user.clone());

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        for _ in 0..3 {
            let current = users.get(user.id);
            // Even a correct code is rejected while the cooldown runs.
            let verdict = usecase
                .execute(&current, OtpPurpose::ConfirmEmail, "123456")
                .await
                .unwrap();
            match verdict {
                OtpVerdict::RateLimited { retry_after_secs } => {
                    assert!(retry_after_secs > 0 && retry_after_secs <= 200);
                }
                other => panic!("expected RateLimited, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn should_allow_one_fresh_cycle_after_cooldown_elapses() {
        let users = MemoryUsers::default();
        let mut user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);
        user.otp.attempts = 0;
        user.otp.cooldown_until = Some(Utc::now() - Duration::seconds(1));
        users.insert(user.clone());

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        let verdict = usecase
            .execute(&user, OtpPurpose::ConfirmEmail, "123456")
            .await
            .unwrap();
        assert_eq!(verdict, OtpVerdict::Ok);

        let stored = users.get(user.id);
        assert_eq!(stored.otp.attempts, OTP_MAX_ATTEMPTS);
        assert_eq!(stored.otp.cooldown_until, None);
        assert_eq!(stored.otp.confirm_email_code, None);
    }

    #[tokio::test]
    async fn should_share_the_attempt_budget_across_purposes() {
        let users = MemoryUsers::default();
        let mut user = issued_user(&users, "123456", OtpPurpose::ConfirmEmail);
        let reset_hash = bcrypt::hash("654321", TEST_COST).unwrap();
        user.otp.reset_password_code = Some(reset_hash);
        user.otp.attempts = 1;
        users.insert(user.clone());

        let usecase = VerifyOtpUseCase {
            users: users.clone(),
        };
        // Burn the last attempt on the confirm-email flow...
        let verdict = usecase
            .execute(&user, OtpPurpose::ConfirmEmail, "000000")
            .await
            .unwrap();
        assert_eq!(verdict, OtpVerdict::Invalid);

        // ...and the reset-password flow is now throttled too.
        let current = users.get(user.id);
        let verdict = usecase
            .execute(&current, OtpPurpose::ResetPassword, "654321")
            .await
            .unwrap();
        assert!(matches!(verdict, OtpVerdict::RateLimited { .. }));
    }

    #[test]
    fn should_map_verdicts_to_error_variants() {
        assert!(OtpVerdict::Ok.into_result().is_ok());
        assert!(matches!(
            OtpVerdict::Invalid.into_result(),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            OtpVerdict::Expired.into_result(),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            OtpVerdict::RateLimited {
                retry_after_secs: 9
            }
            .into_result(),
            Err(ApiError::RateLimited {
                retry_after_secs: 9
            })
        ));
    }
}
