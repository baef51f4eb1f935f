use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::Social;
use crate::api::{FeedParams, JsonBody, QueryParams, created, success};
use crate::error::AppError;
use crate::handler::{AppState, CurrentUser};
use crate::id::{UserId, UserUrlId};
use crate::model::Username;

#[derive(Debug, Deserialize)]
pub struct CreateProfileBody {
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FollowState {
    following: bool,
    changed: bool,
}

pub async fn create_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(body): JsonBody<CreateProfileBody>,
) -> Result<Response, AppError> {
    let username = Username::parse(&body.username)?;
    let profile = Social::new(&state.db).create_profile(&user_id, &username).await?;
    Ok(created(profile))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    match Social::new(&state.db).get_profile_by_username(&username).await? {
        Some(profile) => Ok(success(profile)),
        None => Err(AppError::NotFound(format!("profile {username} not found"))),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsernameCheck {
    username_available: bool,
}

pub async fn check_username(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let username = Username::parse(&username)?;
    let username_available = Social::new(&state.db).username_available(&username).await?;

    tracing::info!(
        user_id = user_id.as_str(),
        username = username.as_str(),
        username_available,
        "username availability checked"
    );
    Ok(success(UsernameCheck { username_available }))
}

pub async fn follow(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let target = UserId::parse(&id)?;
    let changed = Social::new(&state.db).follow(&user_id, &target).await?;
    Ok(success(FollowState {
        following: true,
        changed,
    }))
}

pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let target = UserId::parse(&id)?;
    let changed = Social::new(&state.db).unfollow(&user_id, &target).await?;
    Ok(success(FollowState {
        following: false,
        changed,
    }))
}

pub async fn is_following(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let target = UserId::parse(&id)?;
    let following = Social::new(&state.db).is_following(&user_id, &target).await?;
    Ok(success(FollowState {
        following,
        changed: false,
    }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user_url_id = UserUrlId::parse(&id)?;
    let toggle = Social::new(&state.db).toggle_like(&user_id, &user_url_id).await?;
    Ok(success(toggle))
}

pub async fn own_feed(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    QueryParams(params): QueryParams<FeedParams>,
) -> Result<Response, AppError> {
    let query = params.into_feed_query(user_id.clone(), user_id, state.feed)?;
    let page = Social::new(&state.db).feed(&query).await?;
    Ok(success(page))
}

/// Saves authored by another user, as seen by the caller.
pub async fn user_feed(
    State(state): State<AppState>,
    CurrentUser(viewer_id): CurrentUser,
    Path(id): Path<String>,
    QueryParams(params): QueryParams<FeedParams>,
) -> Result<Response, AppError> {
    let user_id = UserId::parse(&id)?;
    let mut query = params.into_feed_query(user_id, viewer_id, state.feed)?;
    query.source = super::FeedSource::Author;

    let page = Social::new(&state.db).feed(&query).await?;
    Ok(success(page))
}
