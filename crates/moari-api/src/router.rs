use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::clubs;
use crate::messages;
use crate::middleware::require_auth;

/// Build the `/api` surface. Club reads, club registration, auth and user
/// lookup are open; club mutation and messaging need a bearer token.
pub fn build_router(state: AppState, body_limit: usize) -> Router {
    let gate = middleware::from_fn_with_state(state.clone(), require_auth);

    let public_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/google", post(auth::google))
        .route("/api/clubs", get(clubs::list_clubs))
        .route("/api/clubs/register", post(clubs::register_club))
        .route("/api/clubs/user/{user_id}", get(clubs::list_user_clubs))
        .route("/api/messages/user/{user_id}", get(messages::get_user))
        .route(
            "/api/clubs/{id}",
            get(clubs::get_club).merge(
                put(clubs::update_club)
                    .delete(clubs::delete_club)
                    .layer(gate.clone()),
            ),
        );

    let protected_routes = Router::new()
        .route("/api/messages/send", post(messages::send_message))
        .route(
            "/api/messages/conversations/{user_id}",
            get(messages::get_conversations),
        )
        .route(
            "/api/messages/chat/{sender_id}/{receiver_id}",
            get(messages::get_chat),
        )
        .layer(gate);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
