//! sea-orm entities for the api service.

pub mod blocked_users;
pub mod comment_likes;
pub mod comments;
pub mod friend_requests;
pub mod friendships;
pub mod outbox_events;
pub mod post_images;
pub mod post_reactions;
pub mod posts;
pub mod profile_views;
pub mod users;
