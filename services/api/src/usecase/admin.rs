//! Admin operations: overview listing and role escalation.

use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::user::UserRole;

use crate::domain::policy::can_change_role;
use crate::domain::repository::{PostRepository, UserRepository};
use crate::domain::types::{Post, User};

// ── Overview ─────────────────────────────────────────────────────────────────

pub struct AdminOverviewUseCase<U: UserRepository, P: PostRepository> {
    pub users: U,
    pub posts: P,
}

impl<U: UserRepository, P: PostRepository> AdminOverviewUseCase<U, P> {
    /// Everything, soft-deleted rows included. The moderation view.
    pub async fn execute(&self) -> Result<(Vec<User>, Vec<Post>), ApiError> {
        let users = self.users.list_all().await?;
        let posts = self.posts.list_all().await?;
        Ok((users, posts))
    }
}

// ── ChangeRole ───────────────────────────────────────────────────────────────

pub struct ChangeRoleUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> ChangeRoleUseCase<U> {
    /// Apply a role change, guarded by the hierarchy comparison against the
    /// target's *current* role.
    pub async fn execute(
        &self,
        actor: &User,
        target_id: Uuid,
        new_role: UserRole,
    ) -> Result<User, ApiError> {
        let target = self
            .users
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;

        if !can_change_role(actor.role, target.role) {
            return Err(ApiError::forbidden("not allowed to change this user's role"));
        }

        self.users.set_role(target.id, new_role).await?;
        self.users
            .find_by_id(target.id)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))
    }
}
