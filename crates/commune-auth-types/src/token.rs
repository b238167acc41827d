//! JWT issuance and validation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use commune_domain::user::UserRole;

use crate::secrets::{SecretTier, TokenKind, TokenSecrets};

/// Access-token lifetime in seconds (4 hours).
pub const ACCESS_TOKEN_TTL_SECS: u64 = 14400;

/// Refresh-token lifetime in seconds (7 days).
pub const REFRESH_TOKEN_TTL_SECS: u64 = 604800;

/// Errors returned by token validation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
}

/// JWT claims payload shared by access and refresh tokens.
///
/// | Field | JWT claim | Rust type | Meaning |
/// |-------|-----------|-----------|---------|
/// | `sub` | `sub` | UUID string | user ID |
/// | `role` | custom | `u8` wire value | see [`commune_domain::user::UserRole`] |
/// | `iat` | `iat` | seconds since epoch | issue time, compared against the credential-change stamp |
/// | `exp` | `exp` | seconds since epoch | token expiration |
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: u8,
    pub iat: u64,
    pub exp: u64,
}

/// User identity extracted from a validated token.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: Uuid,
    pub role: u8,
    pub issued_at: u64,
    pub expires_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

/// Sign a token of the given kind with the (tier, kind)-scoped secret.
///
/// Returns the encoded token and its expiry timestamp.
pub fn issue_token(
    user_id: Uuid,
    role: UserRole,
    kind: TokenKind,
    secrets: &TokenSecrets,
) -> Result<(String, u64), jsonwebtoken::errors::Error> {
    let now = now_secs();
    let ttl = match kind {
        TokenKind::Access => ACCESS_TOKEN_TTL_SECS,
        TokenKind::Refresh => REFRESH_TOKEN_TTL_SECS,
    };
    let exp = now + ttl;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        role: role.as_u8(),
        iat: now,
        exp,
    };
    let secret = secrets.select(SecretTier::for_role(role), kind);
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, exp))
}

/// Decode and validate a JWT, returning raw claims.
///
/// Validation: HS256, exp checked, required claims: `exp` + `sub`.
/// Default leeway = 60s tolerates clock skew.
pub fn validate_token(token: &str, secret: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_) => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    Ok(data.claims)
}

/// Validate a token and parse its subject, returning the caller identity.
pub fn validate_token_info(token: &str, secret: &str) -> Result<TokenInfo, TokenError> {
    let claims = validate_token(token, secret)?;
    let user_id = claims.sub.parse::<Uuid>().map_err(|_| TokenError::Malformed)?;
    Ok(TokenInfo {
        user_id,
        role: claims.role,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}

/// A credential change at or after the token's issue time invalidates it.
///
/// Second granularity; the `>=` mirrors the stored-timestamp comparison the
/// rest of the system relies on, so a rotation in the same second still
/// revokes the token.
pub fn revoked_by_credential_change(issued_at: u64, changed_at: Option<DateTime<Utc>>) -> bool {
    match changed_at {
        Some(changed_at) => changed_at.timestamp() >= issued_at as i64,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secrets() -> TokenSecrets {
        TokenSecrets {
            user_access: "user-access-secret".into(),
            user_refresh: "user-refresh-secret".into(),
            admin_access: "admin-access-secret".into(),
            admin_refresh: "admin-refresh-secret".into(),
        }
    }

    #[test]
    fn should_round_trip_an_access_token() {
        let s = secrets();
        let user_id = Uuid::new_v4();
        let (token, exp) =
            issue_token(user_id, UserRole::User, TokenKind::Access, &s).unwrap();

        let info = validate_token_info(&token, &s.user_access).unwrap();
        assert_eq!(info.user_id, user_id);
        assert_eq!(info.role, UserRole::User.as_u8());
        assert_eq!(info.expires_at, exp);
        assert!(info.issued_at <= exp);
    }

    #[test]
    fn should_reject_a_user_token_checked_against_the_admin_secret() {
        let s = secrets();
        let (token, _) =
            issue_token(Uuid::new_v4(), UserRole::User, TokenKind::Access, &s).unwrap();

        let err = validate_token_info(&token, &s.admin_access).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn should_sign_admin_and_super_admin_with_the_same_tier_secret() {
        let s = secrets();
        let (token, _) =
            issue_token(Uuid::new_v4(), UserRole::SuperAdmin, TokenKind::Access, &s).unwrap();

        // SuperAdmin tokens verify under the shared admin-tier secret.
        assert!(validate_token_info(&token, &s.admin_access).is_ok());
    }

    #[test]
    fn should_reject_an_access_token_checked_against_the_refresh_secret() {
        let s = secrets();
        let (token, _) =
            issue_token(Uuid::new_v4(), UserRole::User, TokenKind::Access, &s).unwrap();

        let err = validate_token_info(&token, &s.user_refresh).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn should_reject_an_expired_token() {
        let secret = "test-secret";
        let claims = TokenClaims {
            sub: Uuid::new_v4().to_string(),
            role: 0,
            iat: 1_000_000,
            exp: 1_000_060,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let err = validate_token_info(&token, secret).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn should_reject_a_malformed_token() {
        let err = validate_token_info("not-a-jwt", "secret").unwrap_err();
        assert!(matches!(err, TokenError::Malformed));
    }

    #[test]
    fn should_revoke_tokens_issued_before_a_credential_change() {
        let issued_at = now_secs();
        let change = Utc::now() + Duration::seconds(10);
        assert!(revoked_by_credential_change(issued_at, Some(change)));
    }

    #[test]
    fn should_revoke_tokens_issued_in_the_same_second_as_the_change() {
        let now = Utc::now();
        assert!(revoked_by_credential_change(now.timestamp() as u64, Some(now)));
    }

    #[test]
    fn should_keep_tokens_issued_after_the_credential_change() {
        let change = Utc::now() - Duration::seconds(60);
        assert!(!revoked_by_credential_change(now_secs(), Some(change)));
    }

    #[test]
    fn should_keep_tokens_when_credentials_never_changed() {
        assert!(!revoked_by_credential_change(now_secs(), None));
    }
}
