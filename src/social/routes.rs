use axum::{
    Router,
    routing::{get, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", post(handler::create_profile))
        .route("/profiles/:username", get(handler::get_profile))
        .route("/profiles/check/:username", get(handler::check_username))
        .route("/urls/:id/like", post(handler::toggle_like))
        .route("/feed", get(handler::own_feed))
        .route("/users/:id/feed", get(handler::user_feed))
        .route(
            "/users/:id/follow",
            put(handler::follow)
                .delete(handler::unfollow)
                .get(handler::is_following),
        )
}
