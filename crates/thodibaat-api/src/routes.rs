use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::{
    AppState, auth, blocked, businesses, conversations, messages, poll, upload, users, waitlist,
};

/// 50 MB upload limit
const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// The full `/api/v1` surface. Auth is per-handler via the `CurrentUser`
/// extractor, so public and protected routes share one router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/auth/signup", post(auth::signup))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/waitlist", post(waitlist::join))
        .route(
            "/api/v1/businesses",
            get(businesses::list).post(businesses::create),
        )
        .route("/api/v1/users", get(users::list))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/me/status", post(users::update_status))
        .route(
            "/api/v1/users/blocked",
            get(blocked::list).post(blocked::block).delete(blocked::unblock),
        )
        .route(
            "/api/v1/conversations",
            get(conversations::list).post(conversations::create),
        )
        .route("/api/v1/conversations/poll", get(poll::global_poll))
        .route(
            "/api/v1/conversations/{id}",
            get(conversations::get_one)
                .patch(conversations::update)
                .delete(conversations::delete),
        )
        .route("/api/v1/conversations/{id}/poll", get(poll::conversation_poll))
        .route(
            "/api/v1/conversations/{id}/messages",
            get(messages::list)
                .post(messages::send)
                .patch(messages::mark_read),
        )
        .route(
            "/api/v1/conversations/{id}/messages/{message_id}",
            axum::routing::patch(messages::edit).delete(messages::delete),
        )
        .route(
            "/api/v1/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .with_state(state)
}
