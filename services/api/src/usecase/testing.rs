//! In-memory repository fixtures shared by usecase tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use commune_core::error::ApiError;
use commune_domain::pagination::PageRequest;
use commune_domain::reaction::ReactionKind;
use commune_domain::user::{Provider, UserRole};

use crate::domain::repository::{
    CommentRepository, IdentityProvider, ImageStore, OAuthClaims, PostRepository,
    RelationRepository, UserRepository,
};
use crate::domain::types::{
    Comment, ImageRef, OTP_MAX_ATTEMPTS, OtpPurpose, OtpState, OutboxEvent, Post, ProfileView,
    User,
};

pub fn test_user() -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        user_name: "amy".into(),
        email: format!("amy-{}@example.com", Uuid::new_v4()),
        password_hash: None,
        role: UserRole::User,
        provider: Provider::System,
        email_confirmed: true,
        two_step_enabled: false,
        is_deleted: false,
        temp_email: None,
        avatar: None,
        credential_changed_at: None,
        otp: OtpState {
            attempts: OTP_MAX_ATTEMPTS,
            ..Default::default()
        },
        created_at: now,
        updated_at: now,
    }
}

pub fn test_post(author_id: Uuid) -> Post {
    let now = Utc::now();
    Post {
        id: Uuid::new_v4(),
        author_id,
        content: Some("hello from the test suite".into()),
        asset_group: None,
        is_deleted: false,
        deleted_by: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_comment(post_id: Uuid, author_id: Uuid, parent_id: Option<Uuid>) -> Comment {
    let now = Utc::now();
    Comment {
        id: Uuid::new_v4(),
        post_id,
        author_id,
        parent_id,
        text: Some("a comment".into()),
        image: None,
        is_deleted: false,
        deleted_by: None,
        created_at: now,
        updated_at: now,
    }
}

fn window<T>(mut items: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let PageRequest { per_page, page } = page.clamped();
    let start = ((page - 1) * per_page) as usize;
    let items = if start >= items.len() {
        Vec::new()
    } else {
        items.drain(start..).take(per_page as usize).collect()
    };
    (items, total)
}

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct UsersInner {
    users: HashMap<Uuid, User>,
    events: Vec<OutboxEvent>,
}

#[derive(Clone, Default)]
pub struct MemoryUsers(Arc<Mutex<UsersInner>>);

impl MemoryUsers {
    pub fn insert(&self, user: User) {
        self.0.lock().unwrap().users.insert(user.id, user);
    }

    pub fn get(&self, id: Uuid) -> User {
        self.0.lock().unwrap().users[&id].clone()
    }

    pub fn events(&self) -> Vec<OutboxEvent> {
        self.0.lock().unwrap().events.clone()
    }

    fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut User) -> R) -> Result<R, ApiError> {
        let mut inner = self.0.lock().unwrap();
        let user = inner.users.get_mut(&id).expect("user exists in fixture");
        Ok(f(user))
    }
}

impl UserRepository for MemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.0.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .users
            .get(&id)
            .filter(|u| !u.is_deleted)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email && !u.is_deleted)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<(), ApiError> {
        self.insert(user.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>, ApiError> {
        let mut users: Vec<_> = self.0.lock().unwrap().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_user_name(&self, id: Uuid, user_name: &str) -> Result<(), ApiError> {
        self.update(id, |u| u.user_name = user_name.to_owned())
    }

    async fn set_role(&self, id: Uuid, role: UserRole) -> Result<(), ApiError> {
        self.update(id, |u| u.role = role)
    }

    async fn set_email_confirmed(&self, id: Uuid) -> Result<(), ApiError> {
        self.update(id, |u| u.email_confirmed = true)
    }

    async fn set_two_step_enabled(&self, id: Uuid) -> Result<(), ApiError> {
        self.update(id, |u| u.two_step_enabled = true)
    }

    async fn set_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.update(id, |u| {
            u.password_hash = Some(password_hash.to_owned());
            u.credential_changed_at = Some(changed_at);
        })
    }

    async fn set_temp_email(&self, id: Uuid, temp_email: &str) -> Result<(), ApiError> {
        self.update(id, |u| u.temp_email = Some(temp_email.to_owned()))
    }

    async fn commit_email_change(
        &self,
        id: Uuid,
        email: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.update(id, |u| {
            u.email = email.to_owned();
            u.temp_email = None;
            u.credential_changed_at = Some(changed_at);
            u.otp = OtpState {
                attempts: OTP_MAX_ATTEMPTS,
                ..Default::default()
            };
        })
    }

    async fn set_avatar(&self, id: Uuid, avatar: Option<&ImageRef>) -> Result<(), ApiError> {
        self.update(id, |u| u.avatar = avatar.cloned())
    }

    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        code_hash: &str,
        expires_at: DateTime<Utc>,
        event: &OutboxEvent,
    ) -> Result<(), ApiError> {
        self.update(id, |u| {
            let hash = Some(code_hash.to_owned());
            match purpose {
                OtpPurpose::ConfirmEmail => u.otp.confirm_email_code = hash,
                OtpPurpose::ResetPassword => u.otp.reset_password_code = hash,
                OtpPurpose::ChangeEmail => u.otp.change_email_code = hash,
            }
            u.otp.expires_at = Some(expires_at);
        })?;
        self.0.lock().unwrap().events.push(event.clone());
        Ok(())
    }

    async fn set_otp_cooldown(&self, id: Uuid, until: DateTime<Utc>) -> Result<(), ApiError> {
        self.update(id, |u| u.otp.cooldown_until = Some(until))
    }

    async fn reset_otp_attempts(&self, id: Uuid) -> Result<(), ApiError> {
        self.update(id, |u| {
            u.otp.attempts = OTP_MAX_ATTEMPTS;
            u.otp.cooldown_until = None;
        })
    }

    async fn set_otp_attempts(&self, id: Uuid, attempts: i16) -> Result<(), ApiError> {
        self.update(id, |u| u.otp.attempts = attempts)
    }

    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> Result<(), ApiError> {
        self.update(id, |u| {
            match purpose {
                OtpPurpose::ConfirmEmail => u.otp.confirm_email_code = None,
                OtpPurpose::ResetPassword => u.otp.reset_password_code = None,
                OtpPurpose::ChangeEmail => u.otp.change_email_code = None,
            }
            u.otp.expires_at = None;
            u.otp.cooldown_until = None;
            u.otp.attempts = OTP_MAX_ATTEMPTS;
        })
    }
}

// ── Relations ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RelationsInner {
    blocks: HashSet<(Uuid, Uuid)>,
    friends: HashSet<(Uuid, Uuid)>,
    requests: HashSet<(Uuid, Uuid)>,
    views: HashMap<(Uuid, Uuid), ProfileView>,
}

#[derive(Clone, Default)]
pub struct MemoryRelations(Arc<Mutex<RelationsInner>>);

impl RelationRepository for MemoryRelations {
    async fn is_blocked(&self, owner: Uuid, other: Uuid) -> Result<bool, ApiError> {
        Ok(self.0.lock().unwrap().blocks.contains(&(owner, other)))
    }

    async fn block(&self, owner: Uuid, target: Uuid) -> Result<bool, ApiError> {
        Ok(self.0.lock().unwrap().blocks.insert((owner, target)))
    }

    async fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError> {
        Ok(self.0.lock().unwrap().friends.contains(&(a, b)))
    }

    async fn request_exists(&self, a: Uuid, b: Uuid) -> Result<bool, ApiError> {
        let inner = self.0.lock().unwrap();
        Ok(inner.requests.contains(&(a, b)) || inner.requests.contains(&(b, a)))
    }

    async fn create_request(&self, from: Uuid, to: Uuid) -> Result<(), ApiError> {
        self.0.lock().unwrap().requests.insert((from, to));
        Ok(())
    }

    async fn delete_request(&self, from: Uuid, to: Uuid) -> Result<bool, ApiError> {
        Ok(self.0.lock().unwrap().requests.remove(&(from, to)))
    }

    async fn create_friendship(&self, a: Uuid, b: Uuid) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        inner.friends.insert((a, b));
        inner.friends.insert((b, a));
        Ok(())
    }

    async fn record_profile_view(&self, profile: Uuid, viewer: Uuid) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        let now = Utc::now();
        inner
            .views
            .entry((profile, viewer))
            .and_modify(|v| {
                v.visit_count += 1;
                v.last_visited_at = now;
            })
            .or_insert(ProfileView {
                viewer_id: viewer,
                visit_count: 1,
                last_visited_at: now,
            });
        Ok(())
    }

    async fn list_profile_views(&self, profile: Uuid) -> Result<Vec<ProfileView>, ApiError> {
        let inner = self.0.lock().unwrap();
        let mut views: Vec<_> = inner
            .views
            .iter()
            .filter(|((p, _), _)| *p == profile)
            .map(|(_, v)| v.clone())
            .collect();
        views.sort_by_key(|v| v.last_visited_at);
        Ok(views)
    }
}

// ── Posts ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PostsInner {
    posts: HashMap<Uuid, Post>,
    images: HashMap<Uuid, Vec<ImageRef>>,
    reactions: HashMap<(Uuid, Uuid), ReactionKind>,
}

#[derive(Clone, Default)]
pub struct MemoryPosts(Arc<Mutex<PostsInner>>);

impl MemoryPosts {
    pub fn insert(&self, post: Post) {
        self.0.lock().unwrap().posts.insert(post.id, post);
    }

    pub fn get(&self, id: Uuid) -> Option<Post> {
        self.0.lock().unwrap().posts.get(&id).cloned()
    }

    fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Post) -> R) -> Result<R, ApiError> {
        let mut inner = self.0.lock().unwrap();
        let post = inner.posts.get_mut(&id).expect("post exists in fixture");
        Ok(f(post))
    }
}

impl PostRepository for MemoryPosts {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError> {
        Ok(self.get(id))
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Post>, ApiError> {
        Ok(self.get(id).filter(|p| !p.is_deleted))
    }

    async fn create(&self, post: &Post, images: &[ImageRef]) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        inner.posts.insert(post.id, post.clone());
        inner.images.insert(post.id, images.to_vec());
        Ok(())
    }

    async fn update_content(&self, id: Uuid, content: &str) -> Result<(), ApiError> {
        self.update(id, |p| p.content = Some(content.to_owned()))
    }

    async fn set_images(
        &self,
        id: Uuid,
        asset_group: &str,
        images: &[ImageRef],
    ) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        let post = inner.posts.get_mut(&id).expect("post exists in fixture");
        post.asset_group = Some(asset_group.to_owned());
        inner.images.insert(id, images.to_vec());
        Ok(())
    }

    async fn list_images(&self, id: Uuid) -> Result<Vec<ImageRef>, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .images
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError> {
        self.update(id, |p| {
            p.is_deleted = true;
            p.deleted_by = Some(deleted_by);
        })
    }

    async fn restore(&self, id: Uuid) -> Result<(), ApiError> {
        self.update(id, |p| {
            p.is_deleted = false;
            p.deleted_by = None;
        })
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        inner.posts.remove(&id);
        inner.images.remove(&id);
        inner.reactions.retain(|(post_id, _), _| *post_id != id);
        Ok(())
    }

    async fn list(
        &self,
        author: Option<Uuid>,
        deleted: bool,
        page: PageRequest,
    ) -> Result<(Vec<Post>, u64), ApiError> {
        let inner = self.0.lock().unwrap();
        let mut posts: Vec<_> = inner
            .posts
            .values()
            .filter(|p| p.is_deleted == deleted)
            .filter(|p| author.is_none_or(|a| p.author_id == a))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window(posts, page))
    }

    async fn list_all(&self) -> Result<Vec<Post>, ApiError> {
        let mut posts: Vec<_> = self.0.lock().unwrap().posts.values().cloned().collect();
        posts.sort_by_key(|p| p.created_at);
        Ok(posts)
    }

    async fn find_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReactionKind>, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .reactions
            .get(&(post_id, user_id))
            .copied())
    }

    async fn remove_reaction(&self, post_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.0.lock().unwrap().reactions.remove(&(post_id, user_id));
        Ok(())
    }

    async fn upsert_reaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<(), ApiError> {
        self.0
            .lock()
            .unwrap()
            .reactions
            .insert((post_id, user_id), kind);
        Ok(())
    }

    async fn reactions_grouped(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<(ReactionKind, Vec<Uuid>)>, ApiError> {
        let inner = self.0.lock().unwrap();
        let mut grouped: HashMap<ReactionKind, Vec<Uuid>> = HashMap::new();
        for ((p, user), kind) in &inner.reactions {
            if *p == post_id {
                grouped.entry(*kind).or_default().push(*user);
            }
        }
        let mut grouped: Vec<_> = grouped.into_iter().collect();
        grouped.sort_by_key(|(kind, _)| kind.as_u8());
        for (_, ids) in &mut grouped {
            ids.sort();
        }
        Ok(grouped)
    }
}

// ── Comments ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct CommentsInner {
    comments: HashMap<Uuid, Comment>,
    likes: HashSet<(Uuid, Uuid)>,
}

#[derive(Clone, Default)]
pub struct MemoryComments(Arc<Mutex<CommentsInner>>);

impl MemoryComments {
    pub fn insert(&self, comment: Comment) {
        self.0.lock().unwrap().comments.insert(comment.id, comment);
    }

    pub fn get(&self, id: Uuid) -> Option<Comment> {
        self.0.lock().unwrap().comments.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().comments.len()
    }
}

impl CommentRepository for MemoryComments {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError> {
        Ok(self.get(id))
    }

    async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Comment>, ApiError> {
        Ok(self.get(id).filter(|c| !c.is_deleted))
    }

    async fn create(&self, comment: &Comment) -> Result<(), ApiError> {
        self.insert(comment.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        text: Option<&str>,
        image: Option<&ImageRef>,
    ) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        let comment = inner
            .comments
            .get_mut(&id)
            .expect("comment exists in fixture");
        if let Some(text) = text {
            comment.text = Some(text.to_owned());
        }
        if let Some(image) = image {
            comment.image = Some(image.clone());
        }
        Ok(())
    }

    async fn set_deleted(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        let comment = inner
            .comments
            .get_mut(&id)
            .expect("comment exists in fixture");
        comment.is_deleted = true;
        comment.deleted_by = Some(deleted_by);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let mut inner = self.0.lock().unwrap();
        inner.comments.remove(&id);
        inner.likes.retain(|(comment_id, _)| *comment_id != id);
        Ok(())
    }

    async fn find_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>, ApiError> {
        let inner = self.0.lock().unwrap();
        let mut replies: Vec<_> = inner
            .comments
            .values()
            .filter(|c| c.parent_id == Some(parent_id))
            .cloned()
            .collect();
        replies.sort_by_key(|c| c.created_at);
        Ok(replies)
    }

    async fn list_top_level(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), ApiError> {
        let inner = self.0.lock().unwrap();
        let mut comments: Vec<_> = inner
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.parent_id.is_none() && !c.is_deleted)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(window(comments, page))
    }

    async fn has_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        Ok(self.0.lock().unwrap().likes.contains(&(comment_id, user_id)))
    }

    async fn add_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.0.lock().unwrap().likes.insert((comment_id, user_id));
        Ok(())
    }

    async fn remove_like(&self, comment_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.0.lock().unwrap().likes.remove(&(comment_id, user_id));
        Ok(())
    }

    async fn count_likes(&self, comment_id: Uuid) -> Result<u64, ApiError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .likes
            .iter()
            .filter(|(c, _)| *c == comment_id)
            .count() as u64)
    }
}

// ── Image store ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct ImagesInner {
    uploads: u32,
    deleted: Vec<String>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct MemoryImageStore(Arc<Mutex<ImagesInner>>);

impl MemoryImageStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.0.lock().unwrap().fail = true;
        store
    }

    pub fn deleted(&self) -> Vec<String> {
        self.0.lock().unwrap().deleted.clone()
    }
}

impl ImageStore for MemoryImageStore {
    async fn upload(&self, _data: Bytes, folder: &str) -> Result<ImageRef, ApiError> {
        let mut inner = self.0.lock().unwrap();
        if inner.fail {
            return Err(ApiError::Upstream(anyhow::anyhow!("image store down")));
        }
        inner.uploads += 1;
        let n = inner.uploads;
        Ok(ImageRef {
            url: format!("https://img.test/{folder}/{n}"),
            storage_id: format!("img-{n}"),
        })
    }

    async fn delete(&self, storage_id: &str) -> Result<(), ApiError> {
        self.0.lock().unwrap().deleted.push(storage_id.to_owned());
        Ok(())
    }
}

// ── OAuth identity ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct StubIdentity {
    pub claims: Option<OAuthClaims>,
}

impl IdentityProvider for StubIdentity {
    async fn verify(&self, _id_token: &str) -> Result<OAuthClaims, ApiError> {
        self.claims
            .clone()
            .ok_or_else(|| ApiError::unauthorized("identity token rejected"))
    }
}
