pub mod auth;
pub mod convert;
pub mod error;
pub mod event_types;
pub mod events;
pub mod extract;
pub mod feed;
pub mod invites;
pub mod middleware;
pub mod republics;
pub mod users;
pub mod validate;

use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Build the full HTTP surface. The server adds CORS and request tracing on
/// top; tests drive this router directly.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/users/pre-register", post(users::pre_register))
        .route("/users/set-password/{token}", post(users::set_password))
        .route("/events", get(events::list_all))
        .route("/events/public", get(events::list_public))
        .route("/events/types", get(event_types::list))
        .route("/events/types/{id}", get(event_types::get))
        .route("/events/republic/{id}", get(events::list_by_republic))
        .route("/events/user/{id}", get(events::list_by_creator))
        .route("/events/{id}", get(events::get))
        .with_state(state.clone());

    let protected_routes = Router::new()
        // Users
        .route("/users/me", get(users::me))
        .route("/users/{id}", get(users::get).patch(users::update))
        .route("/users/{id}/republic", patch(users::set_republic))
        .route(
            "/users/{id}/social-media",
            get(users::get_social_media).put(users::put_social_media),
        )
        // Republics
        .route("/republics", get(republics::list).post(republics::create))
        .route(
            "/republics/{id}",
            get(republics::get)
                .patch(republics::update)
                .delete(republics::remove),
        )
        .route("/republics/{id}/users", get(republics::members))
        .route("/republics/{id}/casa", put(republics::put_casa))
        // Event types
        .route("/events/types", post(event_types::create))
        .route(
            "/events/types/{id}",
            patch(event_types::update).delete(event_types::remove),
        )
        // Events
        .route("/events", post(events::create))
        .route("/events/{id}", patch(events::update).delete(events::remove))
        .route("/events/{id}/status", patch(events::update_status))
        .route(
            "/events/visible/month/{year}/{month}",
            get(events::visible_by_month),
        )
        // Invites
        .route("/events/invites/user/{id}", get(invites::for_user))
        .route("/events/{id}/invite/batch", post(invites::batch))
        .route("/events/{id}/invite/republics", post(invites::republics))
        .route("/events/{id}/invite/users", post(invites::users))
        .route(
            "/events/{id}/invite/republic/{republic_id}",
            post(invites::republic),
        )
        .route("/events/{id}/invite/{user_id}", post(invites::invite_one))
        .route(
            "/events/{id}/invite/{user_id}/status",
            patch(invites::update_status),
        )
        // Feed
        .route("/feed", get(feed::list).post(feed::create_post))
        .route("/feed/posts/{id}", delete(feed::delete_post))
        .route("/feed/posts/{id}/comments", post(feed::create_comment))
        .route("/feed/posts/{id}/like", post(feed::like_post))
        .route("/feed/comments/{id}", delete(feed::delete_comment))
        .route("/feed/comments/{id}/like", post(feed::like_comment))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn(middleware::error_envelope))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run a blocking service call off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::from(e)
    })?
}
