use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::OnConflict,
};
use uuid::Uuid;

use commune_api_schema::{
    blocked_users, comment_likes, comments, friend_requests, friendships, outbox_events,
    post_images, post_reactions, posts, profile_views, users,
};
use commune_core::error::ApiError;
use commune_domain::pagination::PageRequest;
use commune_domain::reaction::ReactionKind;
use commune_domain::user::{Provider, UserRole};

use crate::domain::repository::{
    CommentRepository, PostRepository, RelationRepository, UserRepository,
};
use crate::domain::types::{
    Comment, ImageRef, OTP_MAX_ATTEMPTS, OtpPurpose, OtpState, OutboxEvent, Post, ProfileView,
    User,
};

fn page_window(page: PageRequest) -> (u64, u64) {
    let PageRequest { per_page, page } = page.clamped();
    (((page - 1) * per_page) as u64, per_page as u64)
}

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

fn user_from_model(model: users::Model) -> Result<User, ApiError> {
    let role = UserRole::from_u8(model.role as u8).context("unknown user role value")?;
    let provider = Provider::from_u8(model.provider as u8).context("unknown provider value")?;
    let avatar = match (model.avatar_url, model.avatar_id) {
        (Some(url), Some(storage_id)) => Some(ImageRef { url, storage_id }),
        _ => None,
    };
    Ok(User {
        id: model.id,
        user_name: model.user_name,
        email: model.email,
        password_hash: model.password_hash,
        role,
        provider,
        email_confirmed: model.email_confirmed,
        two_step_enabled: model.two_step_enabled,
        is_deleted: model.is_deleted,
        temp_email: model.temp_email,
        avatar,
        credential_changed_at: model.credential_changed_at,
        otp: OtpState {
            confirm_email_code: model.confirm_email_otp,
            reset_password_code: model.reset_password_otp,
            change_email_code: model.change_email_otp,
            expires_at: model.otp_expires_at,
            attempts: model.otp_attempts,
            cooldown_until: model.otp_cooldown_until,
        },
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn set_otp_hash(am: &mut users::ActiveModel, purpose: OtpPurpose, hash: Option<String>) {
    match purpose {
        OtpPurpose::ConfirmEmail => am.confirm_email_otp = Set(hash),
        OtpPurpose::ResetPassword => am.reset_password_otp = Set(hash),
        OtpPurpose::ChangeEmail => am.change_email_otp = Set(hash),
    }
}

async fn insert_outbox_event(
    txn: &DatabaseTransaction,
    event: &OutboxEvent,
) -> Result<(), sea_orm::DbErr> {
    let now = Utc::now();
    outbox_events::ActiveModel {
        id: Set(event.id),
        kind: Set(event.kind.clone()),
        payload: Set(event.payload.clone()),
        idempotency_key: Set(event.idempotency_key.clone()),
        attempts: Set(0),
        last_error: Set(None),
        created_at: Set(now),
        next_attempt_at: Set(now),
        processed_at: Set(None),
        failed_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        model.map(user_from_model).transpose()
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let model = users::Entity::find_by_id(id)
            .filter(users::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .context("find active user by id")?;
        model.map(user_from_model).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .context("find user by email")?;
        model.map(user_from_model).transpose()
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .context("find active user by email")?;
        model.map(user_from_model).transpose()
    }

    async fn create(&self, user: &User) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(user.id),
            user_name: Set(user.user_name.clone()),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            role: Set(user.role.as_u8() as i16),
            provider: Set(user.provider.as_u8() as i16),
            email_confirmed: Set(user.email_confirmed),
            two_step_enabled: Set(user.two_step_enabled),
            is_deleted: Set(user.is_deleted),
            temp_email: Set(user.temp_email.clone()),
            avatar_url: Set(user.avatar.as_ref().map(|a| a.url.clone())),
            avatar_id: Set(user.avatar.as_ref().map(|a| a.storage_id.clone())),
            credential_changed_at: Set(user.credential_changed_at),
            confirm_email_otp: Set(user.otp.confirm_email_code.clone()),
            reset_password_otp: Set(user.otp.reset_password_code.clone()),
            change_email_otp: Set(user.otp.change_email_code.clone()),
            otp_expires_at: Set(user.otp.expires_at),
            otp_attempts: Set(user.otp.attempts),
            otp_cooldown_until: Set(user.otp.cooldown_until),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
        .insert(&self.db)
        .await
        .context("create user")?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, ApiError> {
        let models = users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list users")?;
        models.into_iter().map(user_from_model).collect()
    }

    async fn update_user_name(&self, id: Uuid, user_name: &str) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            user_name: Set(user_name.to_owned()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("update user name")?;
        Ok(())
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            role: Set(role.as_u8() as i16),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set user role")?;
        Ok(())
    }

    async fn set_email_confirmed(&self, id: Uuid) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            email_confirmed: Set(true),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set email confirmed")?;
        Ok(())
    }

    async fn set_two_step_enabled(&self, id: Uuid) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            two_step_enabled: Set(true),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set two-step enabled")?;
        Ok(())
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            password_hash: Set(Some(password_hash.to_owned())),
            credential_changed_at: Set(Some(changed_at)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set password")?;
        Ok(())
    }

    async fn set_temp_email(&self, id: Uuid, temp_email: &str) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            temp_email: Set(Some(temp_email.to_owned())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set temp email")?;
        Ok(())
    }

    async fn commit_email_change(
        &self,
        id: Uuid,
        email: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            email: Set(email.to_owned()),
            temp_email: Set(None),
            credential_changed_at: Set(Some(changed_at)),
            confirm_email_otp: Set(None),
            reset_password_otp: Set(None),
            change_email_otp: Set(None),
            otp_expires_at: Set(None),
            otp_cooldown_until: Set(None),
            otp_attempts: Set(OTP_MAX_ATTEMPTS),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("commit email change")?;
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<&ImageRef>) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            avatar_url: Set(avatar.map(|a| a.url.clone())),
            avatar_id: Set(avatar.map(|a| a.storage_id.clone())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set avatar")?;
        Ok(())
    }

    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
        event: &OutboxEvent,
    ) -> Result<(), ApiError> {
        let code_hash = code_hash.to_owned();
        let event = event.clone();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    let mut am = users::ActiveModel {
                        id: Set(id),
                        otp_expires_at: Set(Some(expires_at)),
                        updated_at: Set(Utc::now()),
                        ..Default::default()
                    };
                    set_otp_hash(&mut am, purpose, Some(code_hash));
                    am.update(txn).await?;
                    insert_outbox_event(txn, &event).await
                })
            })
            .await
            .context("store otp with outbox")?;
        Ok(())
    }

    async fn set_otp_cooldown(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            otp_cooldown_until: Set(Some(until)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set otp cooldown")?;
        Ok(())
    }

    async fn reset_otp_attempts(&self, id: Uuid) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            otp_attempts: Set(OTP_MAX_ATTEMPTS),
            otp_cooldown_until: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("reset otp attempts")?;
        Ok(())
    }

    async fn set_otp_attempts(&self, id: Uuid, attempts: i16) -> Result<(), ApiError> {
        users::ActiveModel {
            id: Set(id),
            otp_attempts: Set(attempts),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("set otp attempts")?;
        Ok(())
    }

    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> Result<(), ApiError> {
        let mut am = users::ActiveModel {
            id: Set(id),
            otp_expires_at: Set(None),
            otp_cooldown_until: Set(None),
            otp_attempts: Set(OTP_MAX_ATTEMPTS),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        set_otp_hash(&mut am, purpose, None);
        am.update(&self.db).await.context("clear otp")?;
        Ok(())
    }
}

// ── Relation repository ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbRelationRepository {
    pub db: DatabaseConnection,
}

impl RelationRepository for DbRelationRepository {
    async fn is_blocked(&self, owner: Uuid, other: Uuid) -> Result<bool, ApiError> {
        let row = blocked_users::Entity::find_by_id((owner, other))
            .one(&self.db)
            .await
            .context("check block")?;
        Ok(row.is_some())
    }

    async fn block(&self, owner: Uuid, target: Uuid) -> Result<bool, ApiError> {
        if self.is_blocked(owner, target).await? {
            return Ok(false);
        }
        blocked_users::ActiveModel {
            user_id: Set(owner),
            blocked_id: Set(target),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .context("insert block")?;
        Ok(true)
    }

    async fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError> {
        let row = friendships::Entity::find_by_id((a, b))
            .one(&self.db)
            .await
            .context("check friendship")?;
        Ok(row.is_some())
    }

    async fn request_exists(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError> {
        let count = friend_requests::Entity::find()
            .filter(
                friend_requests::Column::FromUser
                    .eq(a)
                    .and(friend_requests::Column::ToUser.eq(b))
                    .or(friend_requests::Column::FromUser
                        .eq(b)
                        .and(friend_requests::Column::ToUser.eq(a))),
            )
            .count(&self.db)
            .await
            .context("check friend request")?;
        Ok(count > 0)
    }

    async fn create_request(&self, from: Uuid, to: Uuid) -> Result<(), ApiError> {
        friend_requests::ActiveModel {
            from_user: Set(from),
            to_user: Set(to),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .context("create friend request")?;
        Ok(())
    }

    async fn delete_request(&self, from: Uuid, to: Uuid) -> Result<bool, ApiError> {
        let result = friend_requests::Entity::delete_by_id((from, to))
            .exec(&self.db)
            .await
            .context("delete friend request")?;
        Ok(result.rows_affected > 0)
    }

    async fn create_friendship(&self, a: Uuid, b: Uuid) -> Result<(), ApiError> {
        let now = Utc::now();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    friendships::ActiveModel {
                        user_id: Set(a),
                        friend_id: Set(b),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    friendships::ActiveModel {
                        user_id: Set(b),
                        friend_id: Set(a),
                        created_at: Set(now),
                    }
                    .insert(txn)
                    .await?;
                    Ok(())
                })
            })
            .await
            .context("create friendship")?;
        Ok(())
    }

    async fn record_profile_view(&self, profile: Uuid, viewer: Uuid) -> Result<(), ApiError> {
        let now = Utc::now();
        let existing = profile_views::Entity::find_by_id((profile, viewer))
            .one(&self.db)
            .await
            .context("find profile view")?;
        match existing {
            Some(model) => {
                profile_views::ActiveModel {
                    profile_id: Set(profile),
                    viewer_id: Set(viewer),
                    visit_count: Set(model.visit_count + 1),
                    last_visited_at: Set(now),
                }
                .update(&self.db)
                .await
                .context("bump profile view")?;
            }
            None => {
                profile_views::ActiveModel {
                    profile_id: Set(profile),
                    viewer_id: Set(viewer),
                    visit_count: Set(1),
                    last_visited_at: Set(now),
                }
                .insert(&self.db)
                .await
                .context("insert profile view")?;
            }
        }
        Ok(())
    }

    async fn list_profile_views(&self, profile: Uuid) -> Result<Vec<ProfileView>, ApiError> {
        let models = profile_views::Entity::find()
            .filter(profile_views::Column::ProfileId.eq(profile))
            .order_by_desc(profile_views::Column::LastVisitedAt)
            .all(&self.db)
            .await
            .context("list profile views")?;
        Ok(models
            .into_iter()
            .map(|m| ProfileView {
                viewer_id: m.viewer_id,
                visit_count: m.visit_count,
                last_visited_at: m.last_visited_at,
            })
            .collect())
    }
}

// ── Post repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPostRepository {
    pub db: DatabaseConnection,
}

fn post_from_model(model: posts::Model) -> Post {
    Post {
        id: model.id,
        author_id: model.author_id,
        content: model.content,
        asset_group: model.asset_group,
        is_deleted: model.is_deleted,
        deleted_by: model.deleted_by,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

async fn insert_post_images(
    txn: &DatabaseTransaction,
    post_id: Uuid,
    images: &[ImageRef],
) -> Result<(), sea_orm::DbErr> {
    for image in images {
        post_images::ActiveModel {
            id: Set(Uuid::new_v4()),
            post_id: Set(post_id),
            url: Set(image.url.clone()),
            storage_id: Set(image.storage_id.clone()),
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

impl PostRepository for DbPostRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError> {
        let model = posts::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find post by id")?;
        Ok(model.map(post_from_model))
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError> {
        let model = posts::Entity::find_by_id(id)
            .filter(posts::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .context("find active post by id")?;
        Ok(model.map(post_from_model))
    }

    async fn create(&self, post: &Post, images: &[ImageRef]) -> Result<(), ApiError> {
        let post = post.clone();
        let images = images.to_vec();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    posts::ActiveModel {
                        id: Set(post.id),
                        author_id: Set(post.author_id),
                        content: Set(post.content.clone()),
                        asset_group: Set(post.asset_group.clone()),
                        is_deleted: Set(post.is_deleted),
                        deleted_by: Set(post.deleted_by),
                        created_at: Set(post.created_at),
                        updated_at: Set(post.updated_at),
                    }
                    .insert(txn)
                    .await?;
                    insert_post_images(txn, post.id, &images).await
                })
            })
            .await
            .context("create post")?;
        Ok(())
    }

    async fn update_content(&self, id: Uuid, content: &str) -> Result<(), ApiError> {
        posts::ActiveModel {
            id: Set(id),
            content: Set(Some(content.to_owned())),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("update post content")?;
        Ok(())
    }

    async fn set_images(
        &self,
        id: Uuid,
        asset_group: &str,
        images: &[ImageRef],
    ) -> Result<(), ApiError> {
        let asset_group = asset_group.to_owned();
        let images = images.to_vec();
        self.db
            .transaction::<_, (), sea_orm::DbErr>(move |txn| {
                Box::pin(async move {
                    post_images::Entity::delete_many()
                        .filter(post_images::Column::PostId.eq(id))
                        .exec(txn)
                        .await?;
                    insert_post_images(txn, id, &images).await?;
                    posts::ActiveModel {
                        id: Set(id),
                        asset_group: Set(Some(asset_group)),
                        updated_at: Set(Utc::now()),
                        ..Default::default()
                    }
                    .update(txn)
                    .await?;
                    Ok(())
                })
            })
            .await
            .context("replace post images")?;
        Ok(())
    }

    async fn list_images(&self, id: Uuid) -> Result<Vec<ImageRef>, ApiError> {
        let models = post_images::Entity::find()
            .filter(post_images::Column::PostId.eq(id))
            .all(&self.db)
            .await
            .context("list post images")?;
        Ok(models
            .into_iter()
            .map(|m| ImageRef {
                url: m.url,
                storage_id: m.storage_id,
            })
            .collect())
    }

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError> {
        posts::ActiveModel {
            id: Set(id),
            is_deleted: Set(true),
            deleted_by: Set(Some(deleted_by)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("soft-delete post")?;
        Ok(())
    }

    async fn restore(&self, id: Uuid) -> Result<(), ApiError> {
        posts::ActiveModel {
            id: Set(id),
            is_deleted: Set(false),
            deleted_by: Set(None),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("restore post")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        posts::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("hard-delete post")?;
        Ok(())
    }

    async fn list(
        &self,
        author: Option<Uuid>,
        deleted: bool,
        page: PageRequest,
    ) -> Result<(Vec<Post>, u64), ApiError> {
        let mut query = posts::Entity::find().filter(posts::Column::IsDeleted.eq(deleted));
        if let Some(author) = author {
            query = query.filter(posts::Column::AuthorId.eq(author));
        }
        let total = query.clone().count(&self.db).await.context("count posts")?;

        let (offset, limit) = page_window(page);
        let models = query
            .order_by_desc(posts::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list posts")?;
        Ok((models.into_iter().map(post_from_model).collect(), total))
    }

    async fn list_all(&self) -> Result<Vec<Post>, ApiError> {
        let models = posts::Entity::find()
            .order_by_asc(posts::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list all posts")?;
        Ok(models.into_iter().map(post_from_model).collect())
    }

    async fn find_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReactionKind>, ApiError> {
        let model = post_reactions::Entity::find_by_id((post_id, user_id))
            .one(&self.db)
            .await
            .context("find reaction")?;
        match model {
            Some(model) => {
                let kind =
                    ReactionKind::from_u8(model.kind as u8).context("unknown reaction kind")?;
                Ok(Some(kind))
            }
            None => Ok(None),
        }
    }

    async fn remove_reaction(&self, post_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        post_reactions::Entity::delete_by_id((post_id, user_id))
            .exec(&self.db)
            .await
            .context("remove reaction")?;
        Ok(())
    }

    async fn upsert_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<(), ApiError> {
        // One row per (post, user): switching kinds overwrites in place.
        post_reactions::Entity::insert(post_reactions::ActiveModel {
            post_id: Set(post_id),
            user_id: Set(user_id),
            kind: Set(kind.as_u8() as i16),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([
                post_reactions::Column::PostId,
                post_reactions::Column::UserId,
            ])
            .update_columns([
                post_reactions::Column::Kind,
                post_reactions::Column::CreatedAt,
            ])
            .to_owned(),
        )
        .exec(&self.db)
        .await
        .context("upsert reaction")?;
        Ok(())
    }

    async fn reactions_grouped(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<(ReactionKind, Vec<Uuid>)>, ApiError> {
        let models = post_reactions::Entity::find()
            .filter(post_reactions::Column::PostId.eq(post_id))
            .order_by_asc(post_reactions::Column::Kind)
            .order_by_asc(post_reactions::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list reactions")?;

        // Rows arrive sorted by kind, so runs collapse into groups in order.
        let mut grouped: Vec<(ReactionKind, Vec<Uuid>)> = Vec::new();
        for model in models {
            let kind = ReactionKind::from_u8(model.kind as u8).context("unknown reaction kind")?;
            if let Some((last, ids)) = grouped.last_mut() {
                if *last == kind {
                    ids.push(model.user_id);
                    continue;
                }
            }
            grouped.push((kind, vec![model.user_id]));
        }
        Ok(grouped)
    }
}

// ── Comment repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCommentRepository {
    pub db: DatabaseConnection,
}

fn comment_from_model(model: comments::Model) -> Comment {
    let image = match (model.image_url, model.image_id) {
        (Some(url), Some(storage_id)) => Some(ImageRef { url, storage_id }),
        _ => None,
    };
    Comment {
        id: model.id,
        post_id: model.post_id,
        author_id: model.author_id,
        parent_id: model.parent_id,
        text: model.text,
        image,
        is_deleted: model.is_deleted,
        deleted_by: model.deleted_by,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

impl CommentRepository for DbCommentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError> {
        let model = comments::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find comment by id")?;
        Ok(model.map(comment_from_model))
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError> {
        let model = comments::Entity::find_by_id(id)
            .filter(comments::Column::IsDeleted.eq(false))
            .one(&self.db)
            .await
            .context("find active comment by id")?;
        Ok(model.map(comment_from_model))
    }

    async fn create(&self, comment: &Comment) -> Result<(), ApiError> {
        comments::ActiveModel {
            id: Set(comment.id),
            post_id: Set(comment.post_id),
            author_id: Set(comment.author_id),
            parent_id: Set(comment.parent_id),
            text: Set(comment.text.clone()),
            image_url: Set(comment.image.as_ref().map(|i| i.url.clone())),
            image_id: Set(comment.image.as_ref().map(|i| i.storage_id.clone())),
            is_deleted: Set(comment.is_deleted),
            deleted_by: Set(comment.deleted_by),
            created_at: Set(comment.created_at),
            updated_at: Set(comment.updated_at),
        }
        .insert(&self.db)
        .await
        .context("create comment")?;
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        text: Option<&str>,
        image: Option<&ImageRef>,
    ) -> Result<(), ApiError> {
        let mut am = comments::ActiveModel {
            id: Set(id),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(text) = text {
            am.text = Set(Some(text.to_owned()));
        }
        if let Some(image) = image {
            am.image_url = Set(Some(image.url.clone()));
            am.image_id = Set(Some(image.storage_id.clone()));
        }
        am.update(&self.db).await.context("update comment")?;
        Ok(())
    }

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError> {
        comments::ActiveModel {
            id: Set(id),
            is_deleted: Set(true),
            deleted_by: Set(Some(deleted_by)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("soft-delete comment")?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        comments::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .context("hard-delete comment")?;
        Ok(())
    }

    async fn find_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>, ApiError> {
        let models = comments::Entity::find()
            .filter(comments::Column::ParentId.eq(parent_id))
            .order_by_asc(comments::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("find replies")?;
        Ok(models.into_iter().map(comment_from_model).collect())
    }

    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), ApiError> {
        let query = comments::Entity::find()
            .filter(comments::Column::PostId.eq(post_id))
            .filter(comments::Column::ParentId.is_null())
            .filter(comments::Column::IsDeleted.eq(false));
        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("count comments")?;

        let (offset, limit) = page_window(page);
        let models = query
            .order_by_desc(comments::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list comments")?;
        Ok((models.into_iter().map(comment_from_model).collect(), total))
    }

    async fn has_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let row = comment_likes::Entity::find_by_id((comment_id, user_id))
            .one(&self.db)
            .await
            .context("check comment like")?;
        Ok(row.is_some())
    }

    async fn add_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        comment_likes::ActiveModel {
            comment_id: Set(comment_id),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .context("add comment like")?;
        Ok(())
    }

    async fn remove_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        comment_likes::Entity::delete_by_id((comment_id, user_id))
            .exec(&self.db)
            .await
            .context("remove comment like")?;
        Ok(())
    }

    async fn count_likes(&self, comment_id: Uuid) -> Result<u64, ApiError> {
        let count = comment_likes::Entity::find()
            .filter(comment_likes::Column::CommentId.eq(comment_id))
            .count(&self.db)
            .await
            .context("count comment likes")?;
        Ok(count)
    }
}
