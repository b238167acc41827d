#![allow(async_fn_in_trait)]

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::PageRequest;
use commune_domain::reaction::ReactionKind;
use commune_domain::user::UserRole;

use crate::domain::types::{
    Comment, ImageRef, OtpPurpose, OutboxEvent, Post, ProfileView, User,
};

/// Repository for user accounts, credentials, and OTP throttle state.
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;

    /// Like [`find_by_id`](Self::find_by_id), filtered to non-deleted accounts.
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;

    async fn create(&self, user: &User) -> Result<(), ApiError>;

    async fn list_all(&self) -> Result<Vec<User>, ApiError>;

    async fn update_user_name(&self, id: Uuid, user_name: &str) -> Result<(), ApiError>;

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<(), ApiError>;

    async fn set_email_confirmed(&self, id: Uuid) -> Result<(), ApiError>;

    async fn set_two_step_enabled(&self, id: Uuid) -> Result<(), ApiError>;

    /// Store a new password hash and stamp `credential_changed_at`.
    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;

    async fn set_temp_email(&self, id: Uuid, temp_email: &str) -> Result<(), ApiError>;

    /// Swap in the pending email, stamp `credential_changed_at`, clear the
    /// temp address and all OTP state.
    async fn commit_email_change(
        &self,
        id: Uuid,
        email: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;

    async fn set_avatar(&self, id: Uuid, avatar: Option<&ImageRef>) -> Result<(), ApiError>;

    /// Store a purpose's code hash plus the shared expiry, and insert the
    /// outbox event in the same transaction.
    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
        event: &OutboxEvent,
    ) -> Result<(), ApiError>;

    async fn set_otp_cooldown(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), ApiError>;

    /// Reset the attempt budget to the ceiling and clear any cooldown.
    async fn reset_otp_attempts(&self, id: Uuid) -> Result<(), ApiError>;

    async fn set_otp_attempts(&self, id: Uuid, attempts: i16) -> Result<(), ApiError>;

    /// Post-success cleanup: clear a purpose's hash, the shared
    /// expiry/cooldown, and restore the attempt ceiling.
    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> Result<(), ApiError>;
}

/// Repository for the social graph: friendships, requests, blocks, views.
pub trait RelationRepository: Send + Sync {
    /// Whether `owner` has blocked `other`.
    async fn is_blocked(&self, owner: Uuid, other: Uuid) -> Result<bool, ApiError>;

    /// Record a block. Returns `false` when the block already existed.
    async fn block(&self, owner: Uuid, target: Uuid) -> Result<bool, ApiError>;

    async fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError>;

    /// Whether a pending request exists in either direction.
    async fn request_exists(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError>;

    async fn create_request(&self, from: Uuid, to: Uuid) -> Result<(), ApiError>;

    /// Remove a pending request. Returns `false` when none existed.
    async fn delete_request(&self, from: Uuid, to: Uuid) -> Result<bool, ApiError>;

    /// Materialize the friendship in both directions.
    async fn create_friendship(&self, a: Uuid, b: Uuid) -> Result<(), ApiError>;

    /// Upsert a profile visit (bumps the count on repeat views).
    async fn record_profile_view(&self, profile: Uuid, viewer: Uuid) -> Result<(), ApiError>;

    async fn list_profile_views(&self, profile: Uuid) -> Result<Vec<ProfileView>, ApiError>;
}

/// Repository for posts, their images, and reactions.
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError>;

    /// Like [`find_by_id`](Self::find_by_id), filtered to non-deleted posts.
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError>;

    async fn create(&self, post: &Post, images: &[ImageRef]) -> Result<(), ApiError>;

    async fn update_content(&self, id: Uuid, content: &str) -> Result<(), ApiError>;

    /// Replace the post's image rows and record the asset group id.
    async fn set_images(
        &self,
        id: Uuid,
        asset_group: &str,
        images: &[ImageRef],
    ) -> Result<(), ApiError>;

    async fn list_images(&self, id: Uuid) -> Result<Vec<ImageRef>, ApiError>;

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError>;

    /// Clear the soft-delete flag and the deleter reference.
    async fn restore(&self, id: Uuid) -> Result<(), ApiError>;

    /// Hard-delete the row (images and reactions cascade in the store).
    async fn delete(&self, id: Uuid) -> Result<(), ApiError>;

    /// Window a listing: `deleted` selects the freezed view, `author`
    /// restricts to one user's posts. Returns the window plus total count.
    async fn list(
        &self,
        author: Option<Uuid>,
        deleted: bool,
        page: PageRequest,
    ) -> Result<(Vec<Post>, u64), ApiError>;

    async fn list_all(&self) -> Result<Vec<Post>, ApiError>;

    async fn find_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReactionKind>, ApiError>;

    async fn remove_reaction(&self, post_id: Uuid, user_id: Uuid) -> Result<(), ApiError>;

    /// Insert or overwrite the user's single reaction row for the post.
    async fn upsert_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<(), ApiError>;

    /// All reactions on a post, grouped by kind.
    async fn reactions_grouped(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<(ReactionKind, Vec<Uuid>)>, ApiError>;
}

/// Repository for comments and their like sets.
pub trait CommentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError>;

    /// Like [`find_by_id`](Self::find_by_id), filtered to non-deleted comments.
    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError>;

    async fn create(&self, comment: &Comment) -> Result<(), ApiError>;

    async fn update(
        &self,
        id: Uuid,
        text: Option<&str>,
        image: Option<&ImageRef>,
    ) -> Result<(), ApiError>;

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError>;

    /// Hard-delete one row. Descendants are NOT touched; the cascade is
    /// driven by the usecase, children first.
    fn delete(&self, id: Uuid) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;

    /// Direct replies of a comment, soft-deleted ones included (the cascade
    /// must not leave them orphaned).
    fn find_replies(
        &self,
        parent_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Comment>, ApiError>> + Send;

    /// Non-deleted top-level comments of a post, windowed, plus total count.
    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), ApiError>;

    async fn has_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<bool, ApiError>;

    async fn add_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError>;

    async fn remove_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError>;

    async fn count_likes(&self, comment_id: Uuid) -> Result<u64, ApiError>;
}

/// Port for the external image store.
pub trait ImageStore: Send + Sync {
    /// Upload image bytes under a folder key; returns the stable pair.
    async fn upload(&self, data: Bytes, folder: &str) -> Result<ImageRef, ApiError>;

    fn delete(
        &self,
        storage_id: &str,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

/// Verified claims returned by the OAuth identity provider.
#[derive(Debug, Clone)]
pub struct OAuthClaims {
    pub name: String,
    pub email: String,
    pub email_verified: bool,
}

/// Port for OAuth identity-token verification.
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<OAuthClaims, ApiError>;
}
