//! Authorization decisions, each behind a single named function.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use commune_domain::user::UserRole;

use crate::domain::types::UNDO_WINDOW_SECS;

/// Role hierarchy in declaration order, highest first.
const ROLE_HIERARCHY: [UserRole; 3] = [UserRole::SuperAdmin, UserRole::Admin, UserRole::User];

fn hierarchy_index(role: UserRole) -> usize {
    ROLE_HIERARCHY
        .iter()
        .position(|r| *r == role)
        .expect("role present in hierarchy")
}

/// Whether `actor` may change `target`'s role.
///
/// The actor's hierarchy position must come strictly before the target's
/// *current* position: equal or lower-placed actors are rejected. Kept as a
/// one-line comparison so the direction can be flipped in one place.
pub fn can_change_role(actor: UserRole, target: UserRole) -> bool {
    hierarchy_index(actor) < hierarchy_index(target)
}

/// Whether `actor` may soft- or hard-delete a post.
///
/// The post owner or an Admin. Deliberately `Admin` exactly, not the whole
/// admin tier: SuperAdmin moderates through role changes, not content edits.
pub fn can_moderate_post(actor_id: Uuid, actor_role: UserRole, author_id: Uuid) -> bool {
    actor_id == author_id || actor_role == UserRole::Admin
}

/// Whether `actor` may soft- or hard-delete a comment: the comment owner,
/// the parent-post owner, or an Admin.
pub fn can_moderate_comment(
    actor_id: Uuid,
    actor_role: UserRole,
    comment_author_id: Uuid,
    post_author_id: Uuid,
) -> bool {
    actor_id == comment_author_id
        || actor_id == post_author_id
        || actor_role == UserRole::Admin
}

/// Whether `actor` may restore a soft-deleted post.
///
/// Only the original deleter, or an Admin when the deleter was also an
/// Admin. A SuperAdmin-deleted post is not Admin-restorable.
pub fn can_restore_post(
    actor_id: Uuid,
    actor_role: UserRole,
    deleter_id: Uuid,
    deleter_role: UserRole,
) -> bool {
    actor_id == deleter_id
        || (actor_role == UserRole::Admin && deleter_role == UserRole::Admin)
}

/// Whether a post is still inside its owner's hard-delete grace window.
pub fn within_undo_window(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - created_at).num_seconds() < UNDO_WINDOW_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn should_allow_role_change_only_from_strictly_higher_hierarchy() {
        // SuperAdmin sits first in the hierarchy and may change both others.
        assert!(can_change_role(UserRole::SuperAdmin, UserRole::Admin));
        assert!(can_change_role(UserRole::SuperAdmin, UserRole::User));
        assert!(can_change_role(UserRole::Admin, UserRole::User));
    }

    #[test]
    fn should_reject_role_change_for_equal_hierarchy() {
        assert!(!can_change_role(UserRole::User, UserRole::User));
        assert!(!can_change_role(UserRole::Admin, UserRole::Admin));
        assert!(!can_change_role(UserRole::SuperAdmin, UserRole::SuperAdmin));
    }

    #[test]
    fn should_reject_role_change_for_lower_hierarchy() {
        assert!(!can_change_role(UserRole::User, UserRole::Admin));
        assert!(!can_change_role(UserRole::User, UserRole::SuperAdmin));
        assert!(!can_change_role(UserRole::Admin, UserRole::SuperAdmin));
    }

    #[test]
    fn should_let_owner_or_admin_moderate_posts() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_moderate_post(owner, UserRole::User, owner));
        assert!(can_moderate_post(other, UserRole::Admin, owner));
        assert!(!can_moderate_post(other, UserRole::User, owner));
        // SuperAdmin holds no blanket moderation right over content.
        assert!(!can_moderate_post(other, UserRole::SuperAdmin, owner));
    }

    #[test]
    fn should_let_comment_owner_post_owner_or_admin_moderate_comments() {
        let commenter = Uuid::new_v4();
        let poster = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_moderate_comment(commenter, UserRole::User, commenter, poster));
        assert!(can_moderate_comment(poster, UserRole::User, commenter, poster));
        assert!(can_moderate_comment(other, UserRole::Admin, commenter, poster));
        assert!(!can_moderate_comment(other, UserRole::User, commenter, poster));
    }

    #[test]
    fn should_restrict_restore_to_deleter_or_admin_peer() {
        let deleter = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(can_restore_post(deleter, UserRole::User, deleter, UserRole::User));
        assert!(can_restore_post(other, UserRole::Admin, deleter, UserRole::Admin));
        assert!(!can_restore_post(other, UserRole::User, deleter, UserRole::User));
        // A SuperAdmin-deleted post is not Admin-restorable.
        assert!(!can_restore_post(
            other,
            UserRole::Admin,
            deleter,
            UserRole::SuperAdmin
        ));
    }

    #[test]
    fn should_allow_undo_at_119_seconds() {
        let now = Utc::now();
        assert!(within_undo_window(now - Duration::seconds(119), now));
    }

    #[test]
    fn should_reject_undo_at_121_seconds() {
        let now = Utc::now();
        assert!(!within_undo_window(now - Duration::seconds(121), now));
    }

    #[test]
    fn should_reject_undo_at_exactly_120_seconds() {
        let now = Utc::now();
        assert!(!within_undo_window(now - Duration::seconds(120), now));
    }
}
