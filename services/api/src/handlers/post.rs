use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::{Page, PageRequest};
use commune_domain::reaction::ReactionKind;
use commune_domain::user::UserRole;

use crate::domain::types::{ImageRef, Post};
use crate::extract::CurrentUser;
use crate::handlers::read_form;
use crate::state::AppState;
use crate::usecase::post::{
    CreatePostUseCase, GetPostUseCase, ListPostsUseCase, ReactUseCase, RestorePostUseCase,
    SoftDeletePostUseCase, UndoPostUseCase, UpdatePostUseCase,
};

#[derive(Serialize)]
pub struct PostResponse {
    pub id: String,
    pub author_id: String,
    pub content: Option<String>,
    pub is_deleted: bool,
    #[serde(serialize_with = "commune_core::serde::to_rfc3339_ms")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(serialize_with = "commune_core::serde::to_rfc3339_ms")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id.to_string(),
            author_id: post.author_id.to_string(),
            content: post.content,
            is_deleted: post.is_deleted,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ReactionGroupResponse {
    pub kind: ReactionKind,
    pub user_ids: Vec<String>,
}

fn reaction_groups(groups: Vec<(ReactionKind, Vec<Uuid>)>) -> Vec<ReactionGroupResponse> {
    groups
        .into_iter()
        .map(|(kind, ids)| ReactionGroupResponse {
            kind,
            user_ids: ids.iter().map(Uuid::to_string).collect(),
        })
        .collect()
}

// ── POST /post ───────────────────────────────────────────────────────────────

pub async fn create_post(
    current: CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    current.require(&[UserRole::User])?;
    let mut form = read_form(multipart).await?;

    let usecase = CreatePostUseCase {
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    let post = usecase
        .execute(&current.0, form.take("content"), form.images)
        .await?;
    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

// ── PATCH /post/{post_id} ────────────────────────────────────────────────────

pub async fn update_post(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<PostResponse>, ApiError> {
    current.require(&[UserRole::User])?;
    let mut form = read_form(multipart).await?;

    let usecase = UpdatePostUseCase {
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    let post = usecase
        .execute(&current.0, post_id, form.take("content"), form.images)
        .await?;
    Ok(Json(post.into()))
}

// ── PATCH /post/{post_id}/freeze ─────────────────────────────────────────────

pub async fn freeze_post(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = SoftDeletePostUseCase {
        posts: state.post_repo(),
    };
    usecase.execute(&current.0, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /post/{post_id}/restore ────────────────────────────────────────────

pub async fn restore_post(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = RestorePostUseCase {
        posts: state.post_repo(),
        users: state.user_repo(),
    };
    usecase.execute(&current.0, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── DELETE /post/{post_id} ───────────────────────────────────────────────────

pub async fn undo_post(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require(&[UserRole::User])?;
    let usecase = UndoPostUseCase {
        posts: state.post_repo(),
        images: state.image_store.clone(),
    };
    usecase.execute(&current.0, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── GET /post/{post_id} ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub images: Vec<String>,
    pub reactions: Vec<ReactionGroupResponse>,
}

pub async fn get_post(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = GetPostUseCase {
        posts: state.post_repo(),
        relations: state.relation_repo(),
    };
    let detail = usecase.execute(&current.0, post_id).await?;
    Ok(Json(PostDetailResponse {
        post: detail.post.into(),
        images: detail.images.into_iter().map(|i: ImageRef| i.url).collect(),
        reactions: reaction_groups(detail.reactions),
    }))
}

// ── GET /post/active, GET /post/freezed ──────────────────────────────────────

async fn list_posts(
    current: CurrentUser,
    state: AppState,
    deleted: bool,
    page: PageRequest,
) -> Result<Json<Page<PostResponse>>, ApiError> {
    current.require(&[UserRole::User, UserRole::Admin])?;
    let usecase = ListPostsUseCase {
        posts: state.post_repo(),
    };
    let page = usecase.execute(&current.0, deleted, page).await?;
    Ok(Json(page.map(Into::into)))
}

pub async fn active_posts(
    current: CurrentUser,
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<PostResponse>>, ApiError> {
    list_posts(current, state, false, page).await
}

pub async fn freezed_posts(
    current: CurrentUser,
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<Json<Page<PostResponse>>, ApiError> {
    list_posts(current, state, true, page).await
}

// ── PATCH /post/{post_id}/react ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReactRequest {
    pub kind: ReactionKind,
}

pub async fn react(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Json(body): Json<ReactRequest>,
) -> Result<Json<Vec<ReactionGroupResponse>>, ApiError> {
    current.require(&[UserRole::User])?;
    let usecase = ReactUseCase {
        posts: state.post_repo(),
    };
    let groups = usecase.execute(&current.0, post_id, body.kind).await?;
    Ok(Json(reaction_groups(groups)))
}
