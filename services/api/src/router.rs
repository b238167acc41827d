use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use commune_core::health::{healthz, readyz};
use commune_core::middleware::request_id_layer;

use crate::handlers::{
    admin::{change_role, overview},
    auth::{
        confirm_email, forget_password, login, login_confirm, login_google, refresh_token,
        register, reset_password,
    },
    comment::{
        add_reply, create_comment, delete_comment, freeze_comment, like_comment, list_comments,
        list_replies, update_comment,
    },
    post::{
        active_posts, create_post, freeze_post, freezed_posts, get_post, react, restore_post,
        undo_post, update_post,
    },
    user::{
        accept_friend_request, block_user, confirm_email_change, delete_avatar, enable_two_step,
        get_profile, request_email_change, request_two_step, send_friend_request, update_password,
        update_profile, upload_avatar, view_profile,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Auth
        .route("/auth/register", post(register))
        .route("/auth/confirm-email", patch(confirm_email))
        .route("/auth/login", post(login))
        .route("/auth/login/confirm", post(login_confirm))
        .route("/auth/login/google", post(login_google))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/forget-password", post(forget_password))
        .route("/auth/reset-password", patch(reset_password))
        // User
        .route("/user/profile", get(get_profile))
        .route("/user/profile", patch(update_profile))
        .route("/user/profile/{user_id}", get(view_profile))
        .route("/user/email", patch(request_email_change))
        .route("/user/email/confirm", patch(confirm_email_change))
        .route("/user/password", patch(update_password))
        .route("/user/two-step", post(request_two_step))
        .route("/user/two-step", patch(enable_two_step))
        .route("/user/block", patch(block_user))
        .route("/user/friend-request/{friend_id}", post(send_friend_request))
        .route(
            "/user/friend-request/{friend_id}/accept",
            post(accept_friend_request),
        )
        .route("/user/avatar", post(upload_avatar))
        .route("/user/avatar", delete(delete_avatar))
        // Posts
        .route("/post", post(create_post))
        .route("/post/active", get(active_posts))
        .route("/post/freezed", get(freezed_posts))
        .route("/post/{post_id}", get(get_post))
        .route("/post/{post_id}", patch(update_post))
        .route("/post/{post_id}", delete(undo_post))
        .route("/post/{post_id}/freeze", patch(freeze_post))
        .route("/post/{post_id}/restore", patch(restore_post))
        .route("/post/{post_id}/react", patch(react))
        // Comments
        .route("/post/{post_id}/comment", post(create_comment))
        .route("/post/{post_id}/comment", get(list_comments))
        .route(
            "/post/{post_id}/comment/{comment_id}",
            patch(update_comment),
        )
        .route(
            "/post/{post_id}/comment/{comment_id}",
            delete(delete_comment),
        )
        .route("/post/{post_id}/comment/{comment_id}/reply", post(add_reply))
        .route(
            "/post/{post_id}/comment/{comment_id}/replies",
            get(list_replies),
        )
        .route(
            "/post/{post_id}/comment/{comment_id}/freeze",
            patch(freeze_comment),
        )
        .route(
            "/post/{post_id}/comment/{comment_id}/like",
            patch(like_comment),
        )
        // Admin
        .route("/admin", get(overview))
        .route("/admin/role", patch(change_role))
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
