use axum::{Router, http::Method, routing::get};
use std::error::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::handler::{AppState, healthcheck};

pub mod api;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod hash;
pub mod id;
pub mod label;
pub mod model;
pub mod reconcile;
pub mod social;
pub mod url;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/", get(healthcheck))
        .merge(label::tag_routes())
        .merge(label::category_routes())
        .merge(url::routes())
        .merge(social::routes())
        .layer(cors)
        .with_state(state)
}
