use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::{Page, PageRequest};
use commune_domain::user::UserRole;

use crate::domain::types::Comment;
use crate::extract::CurrentUser;
use crate::handlers::read_form;
use crate::state::AppState;
use crate::usecase::comment::{
    CreateCommentUseCase, GetRepliesUseCase, HardDeleteCommentUseCase, ListCommentsUseCase,
    SoftDeleteCommentUseCase, ToggleCommentLikeUseCase, UpdateCommentUseCase,
};

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub parent_id: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
    #[serde(serialize_with = "commune_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.to_string(),
            post_id: comment.post_id.to_string(),
            author_id: comment.author_id.to_string(),
            parent_id: comment.parent_id.map(|id| id.to_string()),
            text: comment.text,
            image_url: comment.image.map(|i| i.url),
            created_at: comment.created_at,
        }
    }
}

// ── POST /post/{post_id}/comment ─────────────────────────────────────────────

pub async fn create_comment(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    current.require(&[UserRole::User])?;
    let mut form = read_form(multipart).await?;

    let usecase = CreateCommentUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    let comment = usecase
        .execute(
            &current.0,
            post_id,
            None,
            form.take("text"),
            form.images.pop(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

// ── POST /post/{post_id}/comment/{comment_id}/reply ──────────────────────────

pub async fn add_reply(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    current.require(&[UserRole::User])?;
    let mut form = read_form(multipart).await?;

    let usecase = CreateCommentUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    let reply = usecase
        .execute(
            &current.0,
            post_id,
            Some(comment_id),
            form.take("text"),
            form.images.pop(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(reply))))
}

// ── GET /post/{post_id}/comment ──────────────────────────────────────────────

pub async fn list_comments(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<CommentResponse>>, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = ListCommentsUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
    };
    let page = usecase.execute(post_id, page).await?;
    Ok(Json(page.map(Into::into)))
}

// ── GET /post/{post_id}/comment/{comment_id}/replies ─────────────────────────

pub async fn list_replies(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = GetRepliesUseCase {
        comments: state.comment_repo(),
    };
    let replies = usecase.execute(comment_id).await?;
    Ok(Json(replies.into_iter().map(Into::into).collect()))
}

// ── PATCH /post/{post_id}/comment/{comment_id} ───────────────────────────────

pub async fn update_comment(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, Uuid)>,
    multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User])?;
    let mut form = read_form(multipart).await?;

    let usecase = UpdateCommentUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    usecase
        .execute(&current.0, comment_id, form.take("text"), form.images.pop())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /post/{post_id}/comment/{comment_id}/freeze ────────────────────────

pub async fn freeze_comment(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = SoftDeleteCommentUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
    };
    usecase.execute(&current.0, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /post/{post_id}/comment/{comment_id} ──────────────────────────────

pub async fn delete_comment(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = HardDeleteCommentUseCase {
        comments: state.comment_repo(),
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    usecase.execute(&current.0, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /post/{post_id}/comment/{comment_id}/like ──────────────────────────

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: u64,
}

pub async fn like_comment(
    current: CurrentUser,
    State(state): State<AppState>,
    Path((_post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<LikeResponse>, ApiError> {
    current.require(&[UserRole::User])?;
    let usecase = ToggleCommentLikeUseCase {
        comments: state.comment_repo(),
    };
    let (liked, likes) = usecase.execute(&current.0, comment_id).await?;
    Ok(Json(LikeResponse { liked, likes }))
}
