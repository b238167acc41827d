//! Profile, email change, 2-step enablement, blocks, friends, avatar.

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use commune_core::error::ApiError;

use crate::domain::repository::{ImageStore, RelationRepository, UserRepository};
use crate::domain::types::{
    OtpPurpose, ProfileView, User, validate_email, validate_user_name,
};
use crate::usecase::otp::{IssueOtpUseCase, VerifyEmailChangeUseCase, VerifyOtpUseCase};

// ── GetProfile ───────────────────────────────────────────────────────────────

pub struct GetProfileUseCase<R: RelationRepository> {
    pub relations: R,
}

impl<R: RelationRepository> GetProfileUseCase<R> {
    pub async fn execute(&self, user: &User) -> Result<Vec<ProfileView>, ApiError> {
        self.relations.list_profile_views(user.id).await
    }
}

// ── ViewProfile ──────────────────────────────────────────────────────────────

pub struct ViewProfileUseCase<U: UserRepository, R: RelationRepository> {
    pub users: U,
    pub relations: R,
}

impl<U: UserRepository, R: RelationRepository> ViewProfileUseCase<U, R> {
    /// Fetch another user's profile, rejecting blocked viewers and counting
    /// the visit. Viewing one's own profile is not counted.
    pub async fn execute(&self, viewer: &User, profile_id: Uuid) -> Result<User, ApiError> {
        if profile_id == viewer.id {
            return Ok(viewer.clone());
        }
        let profile = self
            .users
            .find_active_by_id(profile_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if self.relations.is_blocked(profile.id, viewer.id).await? {
            return Err(ApiError::forbidden("you are blocked"));
        }
        self.relations
            .record_profile_view(profile.id, viewer.id)
            .await?;
        Ok(profile)
    }
}

// ── UpdateProfile ────────────────────────────────────────────────────────────

pub struct UpdateProfileUseCase<U: UserRepository> {
    pub users: U,
}

impl<U: UserRepository> UpdateProfileUseCase<U> {
    pub async fn execute(&self, user: &User, user_name: &str) -> Result<(), ApiError> {
        if !validate_user_name(user_name) {
            return Err(ApiError::validation("user name must be 3-30 characters"));
        }
        self.users.update_user_name(user.id, user_name).await
    }
}

// ── RequestEmailChange ───────────────────────────────────────────────────────

pub struct RequestEmailChangeUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> RequestEmailChangeUseCase<U> {
    /// Record the pending address and dispatch two codes: one to the current
    /// address, one to the new address. Both must be presented to commit.
    pub async fn execute(&self, user: &User, new_email: &str) -> Result<(), ApiError> {
        if !validate_email(new_email) {
            return Err(ApiError::validation("invalid email address"));
        }
        if self.users.find_by_email(new_email).await?.is_some() {
            return Err(ApiError::conflict("email already exists"));
        }
        self.users.set_temp_email(user.id, new_email).await?;

        let issue_otp = IssueOtpUseCase {
            users: self.users.clone(),
            bcrypt_cost: self.bcrypt_cost,
        };
        issue_otp.execute(user, OtpPurpose::ConfirmEmail).await?;

        let mut pending = user.clone();
        pending.temp_email = Some(new_email.to_owned());
        issue_otp.execute(&pending, OtpPurpose::ChangeEmail).await
    }
}

// ── CommitEmailChange ────────────────────────────────────────────────────────

pub struct CommitEmailChangeUseCase<U: UserRepository + Clone> {
    pub users: U,
}

impl<U: UserRepository + Clone> CommitEmailChangeUseCase<U> {
    pub async fn execute(
        &self,
        user: &User,
        current_code: &str,
        pending_code: &str,
    ) -> Result<(), ApiError> {
        let new_email = user
            .temp_email
            .clone()
            .ok_or_else(|| ApiError::validation("no pending email change"))?;

        let verify = VerifyEmailChangeUseCase {
            users: self.users.clone(),
        };
        verify
            .execute(user, current_code, pending_code)
            .await?
            .into_result()?;

        // Swapping the address is a credential rotation: the stamp revokes
        // every outstanding token.
        self.users
            .commit_email_change(user.id, &new_email, Utc::now())
            .await
    }
}

// ── RequestTwoStep ───────────────────────────────────────────────────────────

pub struct RequestTwoStepUseCase<U: UserRepository + Clone> {
    pub users: U,
    pub bcrypt_cost: u32,
}

impl<U: UserRepository + Clone> RequestTwoStepUseCase<U> {
    /// Re-check the password before dispatching the enablement code.
    pub async fn execute(&self, user: &User, password: &str) -> Result<(), ApiError> {
        let password_ok = match &user.password_hash {
            Some(hash) => {
                bcrypt::verify(password, hash).map_err(|e| ApiError::Internal(e.into()))?
            }
            None => false,
        };
        if !password_ok {
            return Err(ApiError::validation("invalid password"));
        }

        let issue_otp = IssueOtpUseCase {
            users: self.users.clone(),
            bcrypt_cost: self.bcrypt_cost,
        };
        issue_otp.execute(user, OtpPurpose::ConfirmEmail).await
    }
}

// ── EnableTwoStep ────────────────────────────────────────────────────────────

pub struct EnableTwoStepUseCase<U: UserRepository + Clone> {
    pub users: U,
}

impl<U: UserRepository + Clone> EnableTwoStepUseCase<U> {
    pub async fn execute(&self, user: &User, code: &str) -> Result<(), ApiError> {
        let verify = VerifyOtpUseCase {
            users: self.users.clone(),
        };
        verify
            .execute(user, OtpPurpose::ConfirmEmail, code)
            .await?
            .into_result()?;

        self.users.set_two_step_enabled(user.id).await
    }
}

// ── BlockUser ────────────────────────────────────────────────────────────────

pub struct BlockUserUseCase<U: UserRepository, R: RelationRepository> {
    pub users: U,
    pub relations: R,
}

impl<U: UserRepository, R: RelationRepository> BlockUserUseCase<U, R> {
    pub async fn execute(&self, actor: &User, email: &str) -> Result<(), ApiError> {
        let target = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if target.id == actor.id {
            return Err(ApiError::validation("cannot block yourself"));
        }
        let inserted = self.relations.block(actor.id, target.id).await?;
        if !inserted {
            return Err(ApiError::conflict("user already blocked"));
        }
        Ok(())
    }
}

// ── SendFriendRequest ────────────────────────────────────────────────────────

pub struct SendFriendRequestUseCase<U: UserRepository, R: RelationRepository> {
    pub users: U,
    pub relations: R,
}

impl<U: UserRepository, R: RelationRepository> SendFriendRequestUseCase<U, R> {
    pub async fn execute(&self, actor: &User, friend_id: Uuid) -> Result<(), ApiError> {
        if friend_id == actor.id {
            return Err(ApiError::validation("cannot befriend yourself"));
        }
        let friend = self
            .users
            .find_active_by_id(friend_id)
            .await?
            .ok_or_else(|| ApiError::not_found("user not found"))?;
        if self.relations.is_blocked(friend.id, actor.id).await?
            || self.relations.is_blocked(actor.id, friend.id).await?
        {
            return Err(ApiError::forbidden("you are blocked"));
        }
        if self.relations.are_friends(actor.id, friend.id).await? {
            return Err(ApiError::conflict("already friends"));
        }
        if self.relations.request_exists(actor.id, friend.id).await? {
            return Err(ApiError::conflict("friend request already exists"));
        }
        self.relations.create_request(actor.id, friend.id).await
    }
}

// ── AcceptFriendRequest ──────────────────────────────────────────────────────

pub struct AcceptFriendRequestUseCase<R: RelationRepository> {
    pub relations: R,
}

impl<R: RelationRepository> AcceptFriendRequestUseCase<R> {
    pub async fn execute(&self, actor: &User, friend_id: Uuid) -> Result<(), ApiError> {
        let removed = self.relations.delete_request(friend_id, actor.id).await?;
        if !removed {
            return Err(ApiError::not_found("friend request not found"));
        }
        self.relations.create_friendship(actor.id, friend_id).await
    }
}

// ── SetAvatar / DeleteAvatar ─────────────────────────────────────────────────

pub struct SetAvatarUseCase<U: UserRepository, S: ImageStore> {
    pub users: U,
    pub images: S,
}

impl<U: UserRepository, S: ImageStore> SetAvatarUseCase<U, S> {
    /// Upload the new avatar, release the previous one, and store the pair.
    pub async fn execute(&self, user: &User, data: Bytes) -> Result<(), ApiError> {
        let folder = format!("users/{}/avatar", user.id);
        let uploaded = self.images.upload(data, &folder).await?;
        if let Some(old) = &user.avatar {
            self.images.delete(&old.storage_id).await?;
        }
        self.users.set_avatar(user.id, Some(&uploaded)).await
    }
}

pub struct DeleteAvatarUseCase<U: UserRepository, S: ImageStore> {
    pub users: U,
    pub images: S,
}

impl<U: UserRepository, S: ImageStore> DeleteAvatarUseCase<U, S> {
    pub async fn execute(&self, user: &User) -> Result<(), ApiError> {
        let avatar = user
            .avatar
            .as_ref()
            .ok_or_else(|| ApiError::not_found("no avatar set"))?;
        self.images.delete(&avatar.storage_id).await?;
        self.users.set_avatar(user.id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::usecase::testing::{
        MemoryImageStore, MemoryRelations, MemoryUsers, test_user,
    };

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn should_reject_blocked_viewers_and_count_visits() {
        let users = MemoryUsers::default();
        let relations = MemoryRelations::default();
        let viewer = test_user();
        let profile = test_user();
        users.insert(viewer.clone());
        users.insert(profile.clone());

        let usecase = ViewProfileUseCase {
            users: users.clone(),
            relations: relations.clone(),
        };
        usecase.execute(&viewer, profile.id).await.unwrap();
        usecase.execute(&viewer, profile.id).await.unwrap();

        let views = relations.list_profile_views(profile.id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].visit_count, 2);

        relations.block(profile.id, viewer.id).await.unwrap();
        let err = usecase.execute(&viewer, profile.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_record_pending_email_and_dispatch_both_codes() {
        let users = MemoryUsers::default();
        let user = test_user();
        users.insert(user.clone());

        let usecase = RequestEmailChangeUseCase {
            users: users.clone(),
            bcrypt_cost: TEST_COST,
        };
        usecase.execute(&user, "new@example.com").await.unwrap();

        let stored = users.get(user.id);
        assert_eq!(stored.temp_email.as_deref(), Some("new@example.com"));
        assert!(stored.otp.confirm_email_code.is_some());
        assert!(stored.otp.change_email_code.is_some());

        let events = users.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, "verify_email_code");
        assert_eq!(events[0].payload["email"], stored.email);
        assert_eq!(events[1].kind, "change_email_code");
        assert_eq!(events[1].payload["email"], "new@example.com");
    }

    #[tokio::test]
    async fn should_reject_email_change_to_a_taken_address() {
        let users = MemoryUsers::default();
        let user = test_user();
        let other = test_user();
        users.insert(user.clone());
        users.insert(other.clone());

        let usecase = RequestEmailChangeUseCase {
            users,
            bcrypt_cost: TEST_COST,
        };
        let err = usecase.execute(&user, &other.email).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_commit_email_change_with_both_codes() {
        let users = MemoryUsers::default();
        let mut user = test_user();
        user.temp_email = Some("new@example.com".into());
        user.otp.confirm_email_code = Some(bcrypt::hash("111111", TEST_COST).unwrap());
        user.otp.change_email_code = Some(bcrypt::hash("222222", TEST_COST).unwrap());
        user.otp.expires_at = Some(Utc::now() + Duration::seconds(120));
        users.insert(user.clone());

        let usecase = CommitEmailChangeUseCase {
            users: users.clone(),
        };
        usecase.execute(&user, "111111", "222222").await.unwrap();

        let stored = users.get(user.id);
        assert_eq!(stored.email, "new@example.com");
        assert_eq!(stored.temp_email, None);
        assert!(stored.credential_changed_at.is_some());
        assert_eq!(stored.otp.confirm_email_code, None);
        assert_eq!(stored.otp.change_email_code, None);
    }

    #[tokio::test]
    async fn should_burn_one_attempt_when_either_change_code_is_wrong() {
        let users = MemoryUsers::default();
        let mut user = test_user();
        user.temp_email = Some("new@example.com".into());
        user.otp.confirm_email_code = Some(bcrypt::hash("111111", TEST_COST).unwrap());
        user.otp.change_email_code = Some(bcrypt::hash("222222", TEST_COST).unwrap());
        user.otp.expires_at = Some(Utc::now() + Duration::seconds(120));
        users.insert(user.clone());

        let usecase = CommitEmailChangeUseCase {
            users: users.clone(),
        };
        let err = usecase.execute(&user, "111111", "999999").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let stored = users.get(user.id);
        assert_eq!(stored.email, user.email);
        assert_eq!(stored.otp.attempts, 4);
    }

    #[tokio::test]
    async fn should_enable_two_step_after_password_and_code_checks() {
        let users = MemoryUsers::default();
        let mut user = test_user();
        user.password_hash = Some(bcrypt::hash("s3cret-pass", TEST_COST).unwrap());
        users.insert(user.clone());

        let request = RequestTwoStepUseCase {
            users: users.clone(),
            bcrypt_cost: TEST_COST,
        };
        let err = request.execute(&user, "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        request.execute(&user, "s3cret-pass").await.unwrap();

        let code = users.events()[0].payload["code"].as_str().unwrap().to_owned();
        let current = users.get(user.id);
        let enable = EnableTwoStepUseCase {
            users: users.clone(),
        };
        enable.execute(&current, &code).await.unwrap();
        assert!(users.get(user.id).two_step_enabled);
    }

    #[tokio::test]
    async fn should_block_once_and_conflict_on_repeat() {
        let users = MemoryUsers::default();
        let relations = MemoryRelations::default();
        let actor = test_user();
        let target = test_user();
        users.insert(actor.clone());
        users.insert(target.clone());

        let usecase = BlockUserUseCase {
            users,
            relations: relations.clone(),
        };
        usecase.execute(&actor, &target.email).await.unwrap();
        assert!(relations.is_blocked(actor.id, target.id).await.unwrap());

        let err = usecase.execute(&actor, &target.email).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_walk_the_friend_request_lifecycle() {
        let users = MemoryUsers::default();
        let relations = MemoryRelations::default();
        let amy = test_user();
        let ben = test_user();
        users.insert(amy.clone());
        users.insert(ben.clone());

        let send = SendFriendRequestUseCase {
            users: users.clone(),
            relations: relations.clone(),
        };
        send.execute(&amy, ben.id).await.unwrap();

        // Duplicate request, either direction, conflicts.
        let err = send.execute(&amy, ben.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        let err = send.execute(&ben, amy.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let accept = AcceptFriendRequestUseCase {
            relations: relations.clone(),
        };
        accept.execute(&ben, amy.id).await.unwrap();
        assert!(relations.are_friends(amy.id, ben.id).await.unwrap());
        assert!(relations.are_friends(ben.id, amy.id).await.unwrap());

        // Once friends, further requests conflict.
        let err = send.execute(&amy, ben.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn should_reject_friend_requests_across_a_block() {
        let users = MemoryUsers::default();
        let relations = MemoryRelations::default();
        let amy = test_user();
        let ben = test_user();
        users.insert(amy.clone());
        users.insert(ben.clone());
        relations.block(ben.id, amy.id).await.unwrap();

        let send = SendFriendRequestUseCase {
            users,
            relations,
        };
        let err = send.execute(&amy, ben.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn should_reject_accepting_a_request_that_was_never_sent() {
        let relations = MemoryRelations::default();
        let amy = test_user();
        let accept = AcceptFriendRequestUseCase { relations };
        let err = accept.execute(&amy, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_replace_the_avatar_and_release_the_old_one() {
        let users = MemoryUsers::default();
        let images = MemoryImageStore::default();
        let user = test_user();
        users.insert(user.clone());

        let set = SetAvatarUseCase {
            users: users.clone(),
            images: images.clone(),
        };
        set.execute(&user, Bytes::from_static(b"png")).await.unwrap();
        let first = users.get(user.id).avatar.unwrap();

        let current = users.get(user.id);
        set.execute(&current, Bytes::from_static(b"png2"))
            .await
            .unwrap();
        assert_eq!(images.deleted(), vec![first.storage_id]);

        let current = users.get(user.id);
        let delete = DeleteAvatarUseCase {
            users: users.clone(),
            images: images.clone(),
        };
        delete.execute(&current).await.unwrap();
        assert_eq!(users.get(user.id).avatar, None);
        assert_eq!(images.deleted().len(), 2);
    }

    #[tokio::test]
    async fn should_error_when_deleting_a_missing_avatar() {
        let usecase = DeleteAvatarUseCase {
            users: MemoryUsers::default(),
            images: MemoryImageStore::default(),
        };
        let err = usecase.execute(&test_user()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
