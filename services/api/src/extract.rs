//! Authenticated-caller extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use commune_auth_types::bearer::parse_authorization;
use commune_auth_types::secrets::TokenKind;
use commune_auth_types::token::{revoked_by_credential_change, validate_token_info};
use commune_core::error::ApiError;
use commune_domain::user::UserRole;

use crate::domain::repository::UserRepository;
use crate::domain::types::User;
use crate::state::AppState;

/// The verified caller, loaded fresh from the store on every request.
///
/// Verification order: parse the `<RoleName> <token>` line, check the
/// signature under the tier's access secret, load the live account, then
/// reject tokens issued at or before the credential-change stamp.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Route-level role gate. 403 when the caller's role is not listed.
    pub fn require(&self, roles: &[UserRole]) -> Result<(), ApiError> {
        if !roles.contains(&self.0.role) {
            return Err(ApiError::forbidden("you are not allowed"));
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    // axum-core 0.5 defines this as `fn -> impl Future + Send` (not `async fn`).
    // Extract values synchronously, return a 'static async move block.
    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let state = state.clone();

        async move {
            let header = header.ok_or_else(|| ApiError::unauthorized("invalid token"))?;
            let line = parse_authorization(&header)
                .ok_or_else(|| ApiError::unauthorized("invalid token"))?;

            let secret = state.secrets.select(line.tier(), TokenKind::Access);
            let info = validate_token_info(line.token, secret)
                .map_err(|_| ApiError::unauthorized("invalid token"))?;

            let user = state
                .user_repo()
                .find_active_by_id(info.user_id)
                .await?
                .ok_or_else(|| ApiError::not_found("user not found"))?;

            if revoked_by_credential_change(info.issued_at, user.credential_changed_at) {
                return Err(ApiError::unauthorized("invalid token, please login again"));
            }

            Ok(CurrentUser(user))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::testing::test_user;

    #[test]
    fn should_gate_routes_by_role_membership() {
        let mut user = test_user();
        user.role = UserRole::Admin;
        let current = CurrentUser(user);

        assert!(current.require(&[UserRole::Admin, UserRole::SuperAdmin]).is_ok());
        assert!(matches!(
            current.require(&[UserRole::User]),
            Err(ApiError::Forbidden(_))
        ));
    }
}
