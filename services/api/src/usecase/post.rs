//! Post lifecycle: create, edit, soft-delete, restore, undo, reactions,
//! listings.

use bytes::Bytes;
use chrono::Utc;
use rand::RngExt;
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::{Page, PageRequest};
use commune_domain::reaction::ReactionKind;
use commune_domain::user::UserRole;

use crate::domain::policy::{can_moderate_post, can_restore_post, within_undo_window};
use crate::domain::repository::{
    ImageStore, PostRepository, RelationRepository, UserRepository,
};
use crate::domain::types::{
    ASSET_GROUP_LEN, ImageRef, MAX_POST_IMAGES, Post, User, validate_text,
};

/// Charset for asset-group ids (lowercase alphanumeric).
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn generate_asset_group() -> String {
    let mut rng = rand::rng();
    (0..ASSET_GROUP_LEN)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

async fn upload_all<S: ImageStore>(
    images: &S,
    data: Vec<Bytes>,
    folder: &str,
) -> Result<Vec<ImageRef>, ApiError> {
    // Uploads are sequential and unrolled on failure: a mid-batch error
    // leaves earlier uploads orphaned in the store. Accepted gap.
    let mut uploaded = Vec::with_capacity(data.len());
    for chunk in data {
        uploaded.push(images.upload(chunk, folder).await?);
    }
    Ok(uploaded)
}

// ── CreatePost ───────────────────────────────────────────────────────────────

pub struct CreatePostUseCase<P: PostRepository, S: ImageStore> {
    pub posts: P,
    pub images: S,
}

impl<P: PostRepository, S: ImageStore> CreatePostUseCase<P, S> {
    pub async fn execute(
        &self,
        author: &User,
        content: Option<String>,
        image_data: Vec<Bytes>,
    ) -> Result<Post, ApiError> {
        if image_data.len() > MAX_POST_IMAGES {
            return Err(ApiError::validation("too many images"));
        }
        if content.is_none() && image_data.is_empty() {
            return Err(ApiError::validation("content is required without images"));
        }
        if let Some(ref content) = content {
            if !validate_text(content) {
                return Err(ApiError::validation("content must be 3-5000 characters"));
            }
        }

        let (asset_group, uploaded) = if image_data.is_empty() {
            (None, Vec::new())
        } else {
            let group = generate_asset_group();
            let folder = format!("posts/{}/{group}", author.id);
            let uploaded = upload_all(&self.images, image_data, &folder).await?;
            (Some(group), uploaded)
        };

        let now = Utc::now();
        let post = Post {
            id: Uuid::now_v7(),
            author_id: author.id,
            content,
            asset_group,
            is_deleted: false,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        self.posts.create(&post, &uploaded).await?;
        Ok(post)
    }
}

// ── UpdatePost ───────────────────────────────────────────────────────────────

pub struct UpdatePostUseCase<P: PostRepository, S: ImageStore> {
    pub posts: P,
    pub images: S,
}

impl<P: PostRepository, S: ImageStore> UpdatePostUseCase<P, S> {
    /// Owner-only edit. Replacing images releases the stored ones first; the
    /// asset group id is assigned once and reused afterwards.
    pub async fn execute(
        &self,
        actor: &User,
        post_id: Uuid,
        content: Option<String>,
        image_data: Vec<Bytes>,
    ) -> Result<Post, ApiError> {
        let post = self
            .posts
            .find_active_by_id(post_id)
            .await?
            .filter(|p| p.author_id == actor.id)
            .ok_or_else(|| ApiError::not_found("post not found or not allowed"))?;

        if image_data.len() > MAX_POST_IMAGES {
            return Err(ApiError::validation("too many images"));
        }

        if !image_data.is_empty() {
            for old in self.posts.list_images(post.id).await? {
                self.images.delete(&old.storage_id).await?;
            }
            let group = post
                .asset_group
                .clone()
                .unwrap_or_else(generate_asset_group);
            let folder = format!("posts/{}/{group}", actor.id);
            let uploaded = upload_all(&self.images, image_data, &folder).await?;
            self.posts.set_images(post.id, &group, &uploaded).await?;
        }

        if let Some(ref content) = content {
            if !validate_text(content) {
                return Err(ApiError::validation("content must be 3-5000 characters"));
            }
            self.posts.update_content(post.id, content).await?;
        }

        self.posts
            .find_by_id(post.id)
            .await?
            .ok_or_else(|| ApiError::not_found("post not found"))
    }
}

// ── SoftDeletePost ───────────────────────────────────────────────────────────

pub struct SoftDeletePostUseCase<P: PostRepository> {
    pub posts: P,
}

impl<P: PostRepository> SoftDeletePostUseCase<P> {
    pub async fn execute(&self, actor: &User, post_id: Uuid) -> Result<(), ApiError> {
        let post = self
            .posts
            .find_active_by_id(post_id)
            .await?
            .ok_or_else(|| ApiError::not_found("post not found or already deleted"))?;
        if !can_moderate_post(actor.id, actor.role, post.author_id) {
            return Err(ApiError::forbidden("not allowed to delete this post"));
        }
        self.posts.set_deleted(post.id, actor.id).await
    }
}

// ── RestorePost ──────────────────────────────────────────────────────────────

pub struct RestorePostUseCase<P: PostRepository, U: UserRepository> {
    pub posts: P,
    pub users: U,
}

impl<P: PostRepository, U: UserRepository> RestorePostUseCase<P, U> {
    pub async fn execute(&self, actor: &User, post_id: Uuid) -> Result<(), ApiError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .filter(|p| p.is_deleted)
            .ok_or_else(|| ApiError::not_found("post not found or not deleted"))?;
        let deleter_id = post
            .deleted_by
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("deleted post without deleter")))?;
        let deleter_role = self
            .users
            .find_by_id(deleter_id)
            .await?
            .map(|u| u.role)
            .unwrap_or(UserRole::User);

        if !can_restore_post(actor.id, actor.role, deleter_id, deleter_role) {
            return Err(ApiError::forbidden("not allowed to restore this post"));
        }
        self.posts.restore(post.id).await
    }
}

// ── UndoPost ─────────────────────────────────────────────────────────────────

pub struct UndoPostUseCase<P: PostRepository, S: ImageStore> {
    pub posts: P,
    pub images: S,
}

impl<P: PostRepository, S: ImageStore> UndoPostUseCase<P, S> {
    /// Permanent owner-only removal, allowed only inside the grace window.
    /// Outside the window the failure is a policy violation, not a 404.
    pub async fn execute(&self, actor: &User, post_id: Uuid) -> Result<(), ApiError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| ApiError::not_found("post not found"))?;
        if post.author_id != actor.id {
            return Err(ApiError::forbidden("not allowed to undo this post"));
        }
        if !within_undo_window(post.created_at, Utc::now()) {
            return Err(ApiError::forbidden("you can't undo this post"));
        }

        for image in self.posts.list_images(post.id).await? {
            self.images.delete(&image.storage_id).await?;
        }
        self.posts.delete(post.id).await
    }
}

// ── GetPost ──────────────────────────────────────────────────────────────────

/// A post with its images and grouped reactions, ready for serialization.
#[derive(Debug)]
pub struct PostDetail {
    pub post: Post,
    pub images: Vec<ImageRef>,
    pub reactions: Vec<(ReactionKind, Vec<Uuid>)>,
}

pub struct GetPostUseCase<P: PostRepository, R: RelationRepository> {
    pub posts: P,
    pub relations: R,
}

impl<P: PostRepository, R: RelationRepository> GetPostUseCase<P, R> {
    pub async fn execute(&self, viewer: &User, post_id: Uuid) -> Result<PostDetail, ApiError> {
        let post = self
            .posts
            .find_active_by_id(post_id)
            .await?
            .ok_or_else(|| ApiError::not_found("post not found"))?;
        if self.relations.is_blocked(post.author_id, viewer.id).await? {
            return Err(ApiError::forbidden("you are blocked"));
        }
        let images = self.posts.list_images(post.id).await?;
        let reactions = self.posts.reactions_grouped(post.id).await?;
        Ok(PostDetail {
            post,
            images,
            reactions,
        })
    }
}

// ── Listings ─────────────────────────────────────────────────────────────────

pub struct ListPostsUseCase<P: PostRepository> {
    pub posts: P,
}

impl<P: PostRepository> ListPostsUseCase<P> {
    /// Window the active or freezed view. Admins see everyone's posts,
    /// everyone else only their own.
    pub async fn execute(
        &self,
        actor: &User,
        deleted: bool,
        page: PageRequest,
    ) -> Result<Page<Post>, ApiError> {
        let author = match actor.role {
            UserRole::Admin => None,
            _ => Some(actor.id),
        };
        let (items, total) = self.posts.list(author, deleted, page).await?;
        Ok(Page::new(items, total, page))
    }
}

// ── React ────────────────────────────────────────────────────────────────────

pub struct ReactUseCase<P: PostRepository> {
    pub posts: P,
}

impl<P: PostRepository> ReactUseCase<P> {
    /// Toggle the caller's reaction: the same kind again un-reacts, a
    /// different kind replaces whatever was set, keeping the user in exactly
    /// one kind's set.
    ///
    /// Read-modify-write on purpose: two simultaneous toggles on one post can
    /// lose an update. Known benign race, kept to match observable behavior
    /// under contention.
    pub async fn execute(
        &self,
        actor: &User,
        post_id: Uuid,
        kind: ReactionKind,
    ) -> Result<Vec<(ReactionKind, Vec<Uuid>)>, ApiError> {
        let post = self
            .posts
            .find_active_by_id(post_id)
            .await?
            .ok_or_else(|| ApiError::not_found("post not found"))?;

        match self.posts.find_reaction(post.id, actor.id).await? {
            Some(current) if current == kind => {
                self.posts.remove_reaction(post.id, actor.id).await?;
            }
            _ => {
                self.posts.upsert_reaction(post.id, actor.id, kind).await?;
            }
        }

        self.posts.reactions_grouped(post.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::usecase::testing::{
        MemoryImageStore, MemoryPosts, MemoryRelations, MemoryUsers, test_post, test_user,
    };

    #[tokio::test]
    async fn should_require_content_or_images() {
        let usecase = CreatePostUseCase {
            posts: MemoryPosts::default(),
            images: MemoryImageStore::default(),
        };
        let err = usecase
            .execute(&test_user(), None, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn should_create_a_post_with_grouped_images() {
        let posts = MemoryPosts::default();
        let usecase = CreatePostUseCase {
            posts: posts.clone(),
            images: MemoryImageStore::default(),
        };
        let author = test_user();
        let post = usecase
            .execute(
                &author,
                Some("picture day".into()),
                vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
            )
            .await
            .unwrap();

        let group = post.asset_group.clone().unwrap();
        assert_eq!(group.len(), 5);
        let stored_images = posts.list_images(post.id).await.unwrap();
        assert_eq!(stored_images.len(), 2);
        assert!(stored_images[0].url.contains(&group));
    }

    #[tokio::test]
    async fn should_cap_the_image_count() {
        let usecase = CreatePostUseCase {
            posts: MemoryPosts::default(),
            images: MemoryImageStore::default(),
        };
        let data = vec![Bytes::from_static(b"x"); 6];
        let err = usecase
            .execute(&test_user(), None, data)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn should_surface_an_image_store_failure_without_creating_the_post() {
        let posts = MemoryPosts::default();
        let usecase = CreatePostUseCase {
            posts: posts.clone(),
            images: MemoryImageStore::failing(),
        };
        let err = usecase
            .execute(&test_user(), None, vec![Bytes::from_static(b"x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
        assert!(posts.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_reuse_the_asset_group_when_replacing_images() {
        let posts = MemoryPosts::default();
        let images = MemoryImageStore::default();
        let author = test_user();

        let create = CreatePostUseCase {
            posts: posts.clone(),
            images: images.clone(),
        };
        let post = create
            .execute(&author, None, vec![Bytes::from_static(b"a")])
            .await
            .unwrap();
        let group = post.asset_group.clone().unwrap();
        let original = posts.list_images(post.id).await.unwrap();

        let update = UpdatePostUseCase {
            posts: posts.clone(),
            images: images.clone(),
        };
        let updated = update
            .execute(&author, post.id, None, vec![Bytes::from_static(b"b")])
            .await
            .unwrap();

        assert_eq!(updated.asset_group.as_deref(), Some(group.as_str()));
        // The replaced image was released from the store.
        assert_eq!(images.deleted(), vec![original[0].storage_id.clone()]);
    }

    #[tokio::test]
    async fn should_hide_other_peoples_posts_from_update() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let stranger = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());

        let update = UpdatePostUseCase {
            posts,
            images: MemoryImageStore::default(),
        };
        let err = update
            .execute(&stranger, post.id, Some("hijack".into()), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_soft_delete_for_owner_and_admin_only() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let mut admin = test_user();
        admin.role = UserRole::Admin;
        let stranger = test_user();

        let post = test_post(author.id);
        posts.insert(post.clone());

        let usecase = SoftDeletePostUseCase {
            posts: posts.clone(),
        };
        let err = usecase.execute(&stranger, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        usecase.execute(&admin, post.id).await.unwrap();
        let stored = posts.get(post.id).unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.deleted_by, Some(admin.id));

        // Already deleted: filtered out as not-found.
        let err = usecase.execute(&author, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_restore_only_for_deleter_or_admin_peer() {
        let posts = MemoryPosts::default();
        let users = MemoryUsers::default();
        let author = test_user();
        let mut admin = test_user();
        admin.role = UserRole::Admin;
        let mut super_admin = test_user();
        super_admin.role = UserRole::SuperAdmin;
        users.insert(author.clone());
        users.insert(admin.clone());
        users.insert(super_admin.clone());

        let usecase = RestorePostUseCase {
            posts: posts.clone(),
            users: users.clone(),
        };

        // Owner-deleted: only the owner restores it, not an Admin.
        let mut post = test_post(author.id);
        post.is_deleted = true;
        post.deleted_by = Some(author.id);
        posts.insert(post.clone());
        let err = usecase.execute(&admin, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        usecase.execute(&author, post.id).await.unwrap();
        assert!(!posts.get(post.id).unwrap().is_deleted);

        // Admin-deleted: another Admin may restore.
        let mut post = test_post(author.id);
        post.is_deleted = true;
        post.deleted_by = Some(admin.id);
        posts.insert(post.clone());
        let mut other_admin = test_user();
        other_admin.role = UserRole::Admin;
        usecase.execute(&other_admin, post.id).await.unwrap();

        // SuperAdmin-deleted: not Admin-restorable.
        let mut post = test_post(author.id);
        post.is_deleted = true;
        post.deleted_by = Some(super_admin.id);
        posts.insert(post.clone());
        let err = usecase.execute(&admin, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_undo_a_fresh_post_and_release_its_images() {
        let posts = MemoryPosts::default();
        let images = MemoryImageStore::default();
        let author = test_user();

        let create = CreatePostUseCase {
            posts: posts.clone(),
            images: images.clone(),
        };
        let mut post = create
            .execute(&author, None, vec![Bytes::from_static(b"a")])
            .await
            .unwrap();
        post.created_at = Utc::now() - Duration::seconds(119);
        posts.insert(post.clone());

        let usecase = UndoPostUseCase {
            posts: posts.clone(),
            images: images.clone(),
        };
        usecase.execute(&author, post.id).await.unwrap();
        assert!(posts.get(post.id).is_none());
        assert_eq!(images.deleted().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_undo_outside_the_window_as_policy_not_404() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let mut post = test_post(author.id);
        post.created_at = Utc::now() - Duration::seconds(121);
        posts.insert(post.clone());

        let usecase = UndoPostUseCase {
            posts: posts.clone(),
            images: MemoryImageStore::default(),
        };
        let err = usecase.execute(&author, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(posts.get(post.id).is_some());
    }

    #[tokio::test]
    async fn should_reject_undo_by_non_owner() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let stranger = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());

        let usecase = UndoPostUseCase {
            posts,
            images: MemoryImageStore::default(),
        };
        let err = usecase.execute(&stranger, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_reject_blocked_viewers_on_get() {
        let posts = MemoryPosts::default();
        let relations = MemoryRelations::default();
        let author = test_user();
        let viewer = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());
        relations.block(author.id, viewer.id).await.unwrap();

        let usecase = GetPostUseCase { posts, relations };
        let err = usecase.execute(&viewer, post.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_toggle_the_same_kind_off() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());

        let usecase = ReactUseCase {
            posts: posts.clone(),
        };
        usecase
            .execute(&author, post.id, ReactionKind::Like)
            .await
            .unwrap();
        let grouped = usecase
            .execute(&author, post.id, ReactionKind::Like)
            .await
            .unwrap();

        // Reacting twice with the same kind is a no-op pair.
        assert!(grouped.is_empty());
    }

    #[tokio::test]
    async fn should_move_the_user_between_kinds() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());

        let usecase = ReactUseCase {
            posts: posts.clone(),
        };
        usecase
            .execute(&author, post.id, ReactionKind::Like)
            .await
            .unwrap();
        let grouped = usecase
            .execute(&author, post.id, ReactionKind::Haha)
            .await
            .unwrap();

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].0, ReactionKind::Haha);
        assert_eq!(grouped[0].1, vec![author.id]);
    }

    #[tokio::test]
    async fn should_scope_listings_by_role_and_window_them() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let mut admin = test_user();
        admin.role = UserRole::Admin;

        for i in 0..12 {
            let mut post = test_post(author.id);
            post.created_at = Utc::now() - Duration::seconds(i);
            posts.insert(post);
        }
        // Another user's post is invisible to `author` but counted for admins.
        posts.insert(test_post(admin.id));

        let usecase = ListPostsUseCase {
            posts: posts.clone(),
        };
        let request = PageRequest { per_page: 5, page: 1 };
        let page = usecase.execute(&author, false, request).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total_items, 12);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.previous_page, None);

        let request = PageRequest { per_page: 5, page: 3 };
        let page = usecase.execute(&author, false, request).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(2));

        let page = usecase
            .execute(&admin, false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_items, 13);
    }

    #[tokio::test]
    async fn should_list_only_deleted_posts_in_the_freezed_view() {
        let posts = MemoryPosts::default();
        let author = test_user();
        let live = test_post(author.id);
        let mut dead = test_post(author.id);
        dead.is_deleted = true;
        dead.deleted_by = Some(author.id);
        posts.insert(live);
        posts.insert(dead.clone());

        let usecase = ListPostsUseCase { posts };
        let page = usecase
            .execute(&author, true, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].id, dead.id);
    }
}
