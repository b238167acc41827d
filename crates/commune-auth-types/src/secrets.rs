//! Role-scoped signing-secret selection.

use commune_domain::user::UserRole;

/// Which secret family signs a token.
///
/// Admin and SuperAdmin share one tier, so rotating a single secret revokes
/// every admin-tier token at once, independently of the user tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretTier {
    User,
    Admin,
}

impl SecretTier {
    pub fn for_role(role: UserRole) -> Self {
        match role {
            UserRole::User => Self::User,
            UserRole::Admin | UserRole::SuperAdmin => Self::Admin,
        }
    }
}

/// Access and refresh tokens carry independent expiry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The four HMAC secrets, keyed by (tier, kind).
#[derive(Debug, Clone)]
pub struct TokenSecrets {
    pub user_access: String,
    pub user_refresh: String,
    pub admin_access: String,
    pub admin_refresh: String,
}

impl TokenSecrets {
    pub fn select(&self, tier: SecretTier, kind: TokenKind) -> &str {
        match (tier, kind) {
            (SecretTier::User, TokenKind::Access) => &self.user_access,
            (SecretTier::User, TokenKind::Refresh) => &self.user_refresh,
            (SecretTier::Admin, TokenKind::Access) => &self.admin_access,
            (SecretTier::Admin, TokenKind::Refresh) => &self.admin_refresh,
        }
    }
}
