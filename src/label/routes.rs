use axum::{
    Router,
    routing::{get, put},
};

use super::{LabelId, handler};
use crate::handler::AppState;
use crate::id::{CategoryId, TagId};

fn label_routes<L: LabelId>(base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(handler::list::<L>).post(handler::create::<L>))
        .route(
            &format!("{base}/:id"),
            put(handler::rename::<L>).delete(handler::delete::<L>),
        )
}

pub fn tag_routes() -> Router<AppState> {
    label_routes::<TagId>("/tags")
}

pub fn category_routes() -> Router<AppState> {
    label_routes::<CategoryId>("/categories")
}
