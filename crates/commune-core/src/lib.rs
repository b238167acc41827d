//! Cross-cutting application plumbing shared by the Commune services.

pub mod error;
pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
