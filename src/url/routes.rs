use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;
use crate::id::{CategoryId, TagId};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/urls", post(handler::add_url))
        .route(
            "/urls/:id/tags",
            get(handler::list_labels::<TagId>).put(handler::update_labels::<TagId>),
        )
        .route(
            "/urls/:id/categories",
            get(handler::list_labels::<CategoryId>).put(handler::update_labels::<CategoryId>),
        )
}
