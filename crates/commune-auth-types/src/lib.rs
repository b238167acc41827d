//! Token vocabulary shared by issuance and verification.
//!
//! Provides JWT claims, role-scoped secret selection, bearer-line parsing,
//! and the credential-rotation check.

pub mod bearer;
pub mod secrets;
pub mod token;
