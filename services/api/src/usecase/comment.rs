//! Comment lifecycle: create, reply, edit, soft-delete, cascading
//! hard-delete, likes, listings.

use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::{Page, PageRequest};

use crate::domain::policy::can_moderate_comment;
use crate::domain::repository::{CommentRepository, ImageStore, PostRepository};
use crate::domain::types::{Comment, Post, User, validate_text};

async fn live_post<P: PostRepository>(posts: &P, post_id: Uuid) -> Result<Post, ApiError> {
    posts
        .find_active_by_id(post_id)
        .await?
        .ok_or_else(|| ApiError::not_found("post not found"))
}

// ── CreateComment ────────────────────────────────────────────────────────────

pub struct CreateCommentUseCase<C: CommentRepository, P: PostRepository, S: ImageStore> {
    pub comments: C,
    pub posts: P,
    pub images: S,
}

impl<C: CommentRepository, P: PostRepository, S: ImageStore> CreateCommentUseCase<C, P, S> {
    /// Attach a comment (or a reply, when `parent_id` is set) to a live post.
    /// A comment needs non-empty text or an image.
    pub async fn execute(
        &self,
        author: &User,
        post_id: Uuid,
        parent_id: Option<Uuid>,
        text: Option<String>,
        image_data: Option<Bytes>,
    ) -> Result<Comment, ApiError> {
        let post = live_post(&self.posts, post_id).await?;

        if let Some(parent_id) = parent_id {
            self.comments
                .find_active_by_id(parent_id)
                .await?
                .filter(|c| c.post_id == post.id)
                .ok_or_else(|| ApiError::not_found("comment not found"))?;
        }

        if text.is_none() && image_data.is_none() {
            return Err(ApiError::validation("text is required without an image"));
        }
        if let Some(ref text) = text {
            if !validate_text(text) {
                return Err(ApiError::validation("text must be 3-5000 characters"));
            }
        }

        let image = match image_data {
            Some(data) => {
                let folder = format!("posts/{}/comments", post.id);
                Some(self.images.upload(data, &folder).await?)
            }
            None => None,
        };

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::now_v7(),
            post_id: post.id,
            author_id: author.id,
            parent_id,
            text,
            image,
            is_deleted: false,
            deleted_by: None,
            created_at: now,
            updated_at: now,
        };
        self.comments.create(&comment).await?;
        Ok(comment)
    }
}

// ── UpdateComment ────────────────────────────────────────────────────────────

pub struct UpdateCommentUseCase<C: CommentRepository, P: PostRepository, S: ImageStore> {
    pub comments: C,
    pub posts: P,
    pub images: S,
}

impl<C: CommentRepository, P: PostRepository, S: ImageStore> UpdateCommentUseCase<C, P, S> {
    pub async fn execute(
        &self,
        actor: &User,
        comment_id: Uuid,
        text: Option<String>,
        image_data: Option<Bytes>,
    ) -> Result<(), ApiError> {
        let comment = self
            .comments
            .find_active_by_id(comment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("comment not found"))?;
        let post = live_post(&self.posts, comment.post_id).await?;
        if comment.author_id != actor.id {
            return Err(ApiError::forbidden("not allowed to edit this comment"));
        }

        let image = match image_data {
            Some(data) => {
                let folder = format!("posts/{}/comments", post.id);
                let uploaded = self.images.upload(data, &folder).await?;
                if let Some(old) = &comment.image {
                    self.images.delete(&old.storage_id).await?;
                }
                Some(uploaded)
            }
            None => None,
        };

        if let Some(ref text) = text {
            if !validate_text(text) {
                return Err(ApiError::validation("text must be 3-5000 characters"));
            }
        }

        self.comments
            .update(comment.id, text.as_deref(), image.as_ref())
            .await
    }
}

// ── SoftDeleteComment ────────────────────────────────────────────────────────

pub struct SoftDeleteCommentUseCase<C: CommentRepository, P: PostRepository> {
    pub comments: C,
    pub posts: P,
}

impl<C: CommentRepository, P: PostRepository> SoftDeleteCommentUseCase<C, P> {
    pub async fn execute(&self, actor: &User, comment_id: Uuid) -> Result<(), ApiError> {
        let comment = self
            .comments
            .find_active_by_id(comment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("comment not found"))?;
        let post = live_post(&self.posts, comment.post_id).await?;

        if !can_moderate_comment(actor.id, actor.role, comment.author_id, post.author_id) {
            return Err(ApiError::forbidden("not allowed to delete this comment"));
        }
        self.comments.set_deleted(comment.id, actor.id).await
    }
}

// ── HardDeleteComment (cascade) ──────────────────────────────────────────────

pub struct HardDeleteCommentUseCase<C: CommentRepository, P: PostRepository, S: ImageStore> {
    pub comments: C,
    pub posts: P,
    pub images: S,
}

/// Remove a comment and, first, every descendant reply. Children are fully
/// removed before their parent, so no orphaned subtree survives a completed
/// run. The deletes are independent operations: a crash mid-cascade leaves
/// orphaned descendants behind. Accepted failure mode.
fn cascade_delete<'a, C: CommentRepository, S: ImageStore>(
    comments: &'a C,
    images: &'a S,
    comment: Comment,
) -> BoxFuture<'a, Result<(), ApiError>> {
    Box::pin(async move {
        for reply in comments.find_replies(comment.id).await? {
            cascade_delete(comments, images, reply).await?;
        }
        if let Some(image) = &comment.image {
            images.delete(&image.storage_id).await?;
        }
        comments.delete(comment.id).await
    })
}

impl<C: CommentRepository, P: PostRepository, S: ImageStore> HardDeleteCommentUseCase<C, P, S> {
    pub async fn execute(&self, actor: &User, comment_id: Uuid) -> Result<(), ApiError> {
        let comment = self
            .comments
            .find_active_by_id(comment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("comment not found"))?;
        let post = live_post(&self.posts, comment.post_id).await?;

        if !can_moderate_comment(actor.id, actor.role, comment.author_id, post.author_id) {
            return Err(ApiError::forbidden("not allowed to delete this comment"));
        }
        cascade_delete(&self.comments, &self.images, comment).await
    }
}

// ── ToggleCommentLike ────────────────────────────────────────────────────────

pub struct ToggleCommentLikeUseCase<C: CommentRepository> {
    pub comments: C,
}

impl<C: CommentRepository> ToggleCommentLikeUseCase<C> {
    /// Binary set-membership toggle. Returns whether the caller now likes
    /// the comment, plus the resulting count.
    pub async fn execute(&self, actor: &User, comment_id: Uuid) -> Result<(bool, u64), ApiError> {
        let comment = self
            .comments
            .find_active_by_id(comment_id)
            .await?
            .ok_or_else(|| ApiError::not_found("comment not found"))?;

        let liked = if self.comments.has_like(comment.id, actor.id).await? {
            self.comments.remove_like(comment.id, actor.id).await?;
            false
        } else {
            self.comments.add_like(comment.id, actor.id).await?;
            true
        };
        let likes = self.comments.count_likes(comment.id).await?;
        Ok((liked, likes))
    }
}

// ── Listings ─────────────────────────────────────────────────────────────────

pub struct ListCommentsUseCase<C: CommentRepository, P: PostRepository> {
    pub comments: C,
    pub posts: P,
}

impl<C: CommentRepository, P: PostRepository> ListCommentsUseCase<C, P> {
    /// Window the live top-level comments of a post. Replies are fetched
    /// per-comment via [`GetRepliesUseCase`].
    pub async fn execute(&self, post_id: Uuid, page: PageRequest) -> Result<Page<Comment>, ApiError> {
        live_post(&self.posts, post_id).await?;
        let (items, total) = self.comments.list_top_level(post_id, page).await?;
        Ok(Page::new(items, total, page))
    }
}

pub struct GetRepliesUseCase<C: CommentRepository> {
    pub comments: C,
}

impl<C: CommentRepository> GetRepliesUseCase<C> {
    pub async fn execute(&self, parent_id: Uuid) -> Result<Vec<Comment>, ApiError> {
        self.comments
            .find_active_by_id(parent_id)
            .await?
            .ok_or_else(|| ApiError::not_found("comment not found"))?;
        let replies = self.comments.find_replies(parent_id).await?;
        Ok(replies.into_iter().filter(|c| !c.is_deleted).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use commune_domain::user::UserRole;

    use crate::usecase::testing::{
        MemoryComments, MemoryImageStore, MemoryPosts, test_comment, test_post, test_user,
    };

    fn fixture() -> (MemoryComments, MemoryPosts, MemoryImageStore, User, Post) {
        let comments = MemoryComments::default();
        let posts = MemoryPosts::default();
        let images = MemoryImageStore::default();
        let author = test_user();
        let post = test_post(author.id);
        posts.insert(post.clone());
        (comments, posts, images, author, post)
    }

    #[tokio::test]
    async fn should_require_text_or_image() {
        let (comments, posts, images, author, post) = fixture();
        let usecase = CreateCommentUseCase {
            comments,
            posts,
            images,
        };
        let err = usecase
            .execute(&author, post.id, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn should_accept_an_image_only_comment() {
        let (comments, posts, images, author, post) = fixture();
        let usecase = CreateCommentUseCase {
            comments,
            posts,
            images,
        };
        let comment = usecase
            .execute(&author, post.id, None, None, Some(Bytes::from_static(b"png")))
            .await
            .unwrap();
        assert!(comment.text.is_none());
        assert!(comment.image.is_some());
    }

    #[tokio::test]
    async fn should_reject_commenting_on_a_deleted_post() {
        let (comments, posts, images, author, post) = fixture();
        posts.set_deleted(post.id, author.id).await.unwrap();

        let usecase = CreateCommentUseCase {
            comments,
            posts,
            images,
        };
        let err = usecase
            .execute(&author, post.id, None, Some("hi there".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_reject_replying_to_a_comment_on_another_post() {
        let (comments, posts, images, author, post) = fixture();
        let other_post = test_post(author.id);
        posts.insert(other_post.clone());
        let parent = test_comment(other_post.id, author.id, None);
        comments.insert(parent.clone());

        let usecase = CreateCommentUseCase {
            comments,
            posts,
            images,
        };
        let err = usecase
            .execute(
                &author,
                post.id,
                Some(parent.id),
                Some("mismatched".into()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_let_only_the_author_edit() {
        let (comments, posts, images, author, post) = fixture();
        let comment = test_comment(post.id, author.id, None);
        comments.insert(comment.clone());

        let usecase = UpdateCommentUseCase {
            comments: comments.clone(),
            posts,
            images,
        };
        let stranger = test_user();
        let err = usecase
            .execute(&stranger, comment.id, Some("edited".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        usecase
            .execute(&author, comment.id, Some("edited".into()), None)
            .await
            .unwrap();
        assert_eq!(comments.get(comment.id).unwrap().text.as_deref(), Some("edited"));
    }

    #[tokio::test]
    async fn should_apply_the_moderation_matrix_to_soft_delete() {
        let (comments, posts, _, post_owner, post) = fixture();
        let commenter = test_user();
        let mut admin = test_user();
        admin.role = UserRole::Admin;
        let stranger = test_user();

        let usecase = SoftDeleteCommentUseCase {
            comments: comments.clone(),
            posts,
        };

        for actor in [&commenter, &post_owner, &admin] {
            let comment = test_comment(post.id, commenter.id, None);
            comments.insert(comment.clone());
            usecase.execute(actor, comment.id).await.unwrap();
            let stored = comments.get(comment.id).unwrap();
            assert!(stored.is_deleted);
            assert_eq!(stored.deleted_by, Some(actor.id));
        }

        let comment = test_comment(post.id, commenter.id, None);
        comments.insert(comment.clone());
        let err = usecase.execute(&stranger, comment.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_cascade_a_three_level_reply_tree() {
        let (comments, posts, images, author, post) = fixture();
        let mut root = test_comment(post.id, author.id, None);
        root.image = Some(crate::domain::types::ImageRef {
            url: "https://img.test/root".into(),
            storage_id: "img-root".into(),
        });
        let reply_a = test_comment(post.id, author.id, Some(root.id));
        let reply_b = test_comment(post.id, author.id, Some(root.id));
        let nested = test_comment(post.id, author.id, Some(reply_b.id));
        comments.insert(root.clone());
        comments.insert(reply_a);
        comments.insert(reply_b);
        comments.insert(nested);
        assert_eq!(comments.len(), 4);

        let usecase = HardDeleteCommentUseCase {
            comments: comments.clone(),
            posts,
            images: images.clone(),
        };
        usecase.execute(&author, root.id).await.unwrap();

        // Nothing referencing the tree survives, and the attached image was
        // released.
        assert_eq!(comments.len(), 0);
        assert_eq!(images.deleted(), vec!["img-root".to_owned()]);
    }

    #[tokio::test]
    async fn should_cascade_over_soft_deleted_replies_too() {
        let (comments, posts, images, author, post) = fixture();
        let root = test_comment(post.id, author.id, None);
        let mut reply = test_comment(post.id, author.id, Some(root.id));
        reply.is_deleted = true;
        reply.deleted_by = Some(author.id);
        comments.insert(root.clone());
        comments.insert(reply);

        let usecase = HardDeleteCommentUseCase {
            comments: comments.clone(),
            posts,
            images,
        };
        usecase.execute(&author, root.id).await.unwrap();
        assert_eq!(comments.len(), 0);
    }

    #[tokio::test]
    async fn should_toggle_likes_on_and_off() {
        let (comments, _, _, author, post) = fixture();
        let comment = test_comment(post.id, author.id, None);
        comments.insert(comment.clone());

        let usecase = ToggleCommentLikeUseCase {
            comments: comments.clone(),
        };
        let (liked, likes) = usecase.execute(&author, comment.id).await.unwrap();
        assert!(liked);
        assert_eq!(likes, 1);

        let (liked, likes) = usecase.execute(&author, comment.id).await.unwrap();
        assert!(!liked);
        assert_eq!(likes, 0);
    }

    #[tokio::test]
    async fn should_list_live_top_level_comments_only() {
        let (comments, posts, _, author, post) = fixture();
        let top = test_comment(post.id, author.id, None);
        let mut deleted = test_comment(post.id, author.id, None);
        deleted.is_deleted = true;
        let reply = test_comment(post.id, author.id, Some(top.id));
        comments.insert(top.clone());
        comments.insert(deleted);
        comments.insert(reply);

        let usecase = ListCommentsUseCase {
            comments,
            posts,
        };
        let page = usecase
            .execute(post.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].id, top.id);
    }

    #[tokio::test]
    async fn should_list_only_live_replies() {
        let (comments, _, _, author, post) = fixture();
        let parent = test_comment(post.id, author.id, None);
        let live = test_comment(post.id, author.id, Some(parent.id));
        let mut dead = test_comment(post.id, author.id, Some(parent.id));
        dead.is_deleted = true;
        comments.insert(parent.clone());
        comments.insert(live.clone());
        comments.insert(dead);

        let usecase = GetRepliesUseCase {
            comments,
        };
        let replies = usecase.execute(parent.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, live.id);
    }
}
