//! Authorization-line parsing.
//!
//! The Authorization header is `<RoleName> <token>` — the prefix names the
//! caller's claimed role and thereby selects the verification secret tier
//! before the token can be decoded.

use commune_domain::user::UserRole;

use crate::secrets::SecretTier;

/// A parsed Authorization header: the claimed role prefix and the raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BearerLine<'a> {
    pub claimed_role: UserRole,
    pub token: &'a str,
}

impl BearerLine<'_> {
    pub fn tier(&self) -> SecretTier {
        SecretTier::for_role(self.claimed_role)
    }
}

/// Split `<RoleName> <token>` into its parts.
///
/// Returns `None` for a missing prefix, an unknown role name, or an empty
/// token — the caller maps all three to an authentication failure.
pub fn parse_authorization(header: &str) -> Option<BearerLine<'_>> {
    let (prefix, token) = header.split_once(' ')?;
    let claimed_role = UserRole::from_name(prefix)?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(BearerLine {
        claimed_role,
        token,
    })
}
