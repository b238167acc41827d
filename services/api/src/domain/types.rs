use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use commune_domain::user::{Provider, UserRole};

/// OTP code length in digits.
pub const OTP_CODE_LEN: usize = 6;

/// OTP time-to-live in seconds (2 minutes).
pub const OTP_TTL_SECS: i64 = 120;

/// Verification attempts granted per cycle.
pub const OTP_MAX_ATTEMPTS: i16 = 5;

/// Cooldown after the attempt budget is exhausted (5 minutes).
pub const OTP_COOLDOWN_SECS: i64 = 300;

/// Grace window for an owner's hard delete of a post (2 minutes).
pub const UNDO_WINDOW_SECS: i64 = 120;

/// Maximum images on one post.
pub const MAX_POST_IMAGES: usize = 5;

/// Length of the random id grouping a post's stored images.
pub const ASSET_GROUP_LEN: usize = 5;

/// Stable reference pair returned by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub storage_id: String,
}

/// Which one-time-code flow a stored hash belongs to.
///
/// `ConfirmEmail` is reused by the 2-step login confirmation and 2-step
/// enablement flows, as in the original system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    ConfirmEmail,
    ResetPassword,
    ChangeEmail,
}

impl OtpPurpose {
    /// Outbox event kind dispatched when a code of this purpose is issued.
    pub fn event_kind(self) -> &'static str {
        match self {
            Self::ConfirmEmail => "verify_email_code",
            Self::ResetPassword => "reset_password_code",
            Self::ChangeEmail => "change_email_code",
        }
    }
}

/// Per-user OTP throttle state.
///
/// The three purpose hashes share one expiry/attempts/cooldown triple, so
/// exhausting attempts on one purpose blocks the others. Deliberate carry-over
/// from the original system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpState {
    pub confirm_email_code: Option<String>,
    pub reset_password_code: Option<String>,
    pub change_email_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub attempts: i16,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl OtpState {
    pub fn code_for(&self, purpose: OtpPurpose) -> Option<&str> {
        match purpose {
            OtpPurpose::ConfirmEmail => self.confirm_email_code.as_deref(),
            OtpPurpose::ResetPassword => self.reset_password_code.as_deref(),
            OtpPurpose::ChangeEmail => self.change_email_code.as_deref(),
        }
    }
}

/// User account: credentials, role, throttle state, social flags.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    /// Absent for OAuth-provisioned accounts.
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub provider: Provider,
    pub email_confirmed: bool,
    pub two_step_enabled: bool,
    pub is_deleted: bool,
    pub temp_email: Option<String>,
    pub avatar: Option<ImageRef>,
    /// Tokens issued at or before this instant are rejected.
    pub credential_changed_at: Option<DateTime<Utc>>,
    pub otp: OtpState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post. Images live in their own relation, fetched separately.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: Option<String>,
    pub asset_group: Option<String>,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment; `parent_id` forms the reply tree.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub text: Option<String>,
    pub image: Option<ImageRef>,
    pub is_deleted: bool,
    pub deleted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One viewer's visit record on a profile.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub viewer_id: Uuid,
    pub visit_count: i32,
    pub last_visited_at: DateTime<Utc>,
}

/// Outbox event for async delivery (e.g. OTP email).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

/// Validate a display name: 1–30 chars after trimming, at least 3.
pub fn validate_user_name(name: &str) -> bool {
    let trimmed = name.trim();
    (3..=30).contains(&trimmed.chars().count())
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    tld.len() >= 2 && domain.split('.').all(|label| !label.is_empty())
}

/// Post/comment body length bounds (when text is present).
pub fn validate_text(text: &str) -> bool {
    let len = text.trim().chars().count();
    (3..=5000).contains(&len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_valid_user_names() {
        assert!(validate_user_name("amy"));
        assert!(validate_user_name("  padded name  "));
        assert!(validate_user_name(&"x".repeat(30)));
    }

    #[test]
    fn should_reject_out_of_bounds_user_names() {
        assert!(!validate_user_name("ab"));
        assert!(!validate_user_name(""));
        assert!(!validate_user_name(&"x".repeat(31)));
    }

    #[test]
    fn should_accept_plausible_emails() {
        assert!(validate_email("amy@example.com"));
        assert!(validate_email("a.b-c@mail.example.org"));
    }

    #[test]
    fn should_reject_malformed_emails() {
        assert!(!validate_email("no-at-sign"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email("amy@"));
        assert!(!validate_email("amy@nodot"));
        assert!(!validate_email("amy@ex ample.com"));
        assert!(!validate_email("amy@example..com"));
        assert!(!validate_email("amy@example.c"));
    }

    #[test]
    fn should_bound_text_length() {
        assert!(validate_text("abc"));
        assert!(!validate_text("ab"));
        assert!(!validate_text(&"x".repeat(5001)));
    }

    #[test]
    fn should_look_up_otp_code_by_purpose() {
        let otp = OtpState {
            confirm_email_code: Some("a".into()),
            reset_password_code: Some("b".into()),
            change_email_code: None,
            ..Default::default()
        };
        assert_eq!(otp.code_for(OtpPurpose::ConfirmEmail), Some("a"));
        assert_eq!(otp.code_for(OtpPurpose::ResetPassword), Some("b"));
        assert_eq!(otp.code_for(OtpPurpose::ChangeEmail), None);
    }

    #[test]
    fn should_map_purposes_to_event_kinds() {
        assert_eq!(OtpPurpose::ConfirmEmail.event_kind(), "verify_email_code");
        assert_eq!(OtpPurpose::ResetPassword.event_kind(), "reset_password_code");
        assert_eq!(OtpPurpose::ChangeEmail.event_kind(), "change_email_code");
    }
}
