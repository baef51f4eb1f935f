use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{LabelId, Labels};
use crate::api::{JsonBody, created, success};
use crate::error::AppError;
use crate::handler::{AppState, CurrentUser};
use crate::model::LabelName;

#[derive(Debug, Deserialize)]
pub struct LabelBody {
    pub name: String,
}

pub async fn list<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Response, AppError> {
    let labels = Labels::new(&state.db).list::<L>(&user_id).await?;
    Ok(success(labels))
}

pub async fn create<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(body): JsonBody<LabelBody>,
) -> Result<Response, AppError> {
    let name = LabelName::parse(&body.name, L::KIND.display_name())?;
    let label = Labels::new(&state.db).create::<L>(&user_id, &name).await?;
    Ok(created(label))
}

pub async fn rename<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<LabelBody>,
) -> Result<Response, AppError> {
    let id = L::parse(&id)?;
    let name = LabelName::parse(&body.name, L::KIND.display_name())?;
    let label = Labels::new(&state.db).rename(&user_id, &id, &name).await?;
    Ok(success(label))
}

pub async fn delete<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = L::parse(&id)?;
    Labels::new(&state.db).delete(&user_id, &id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
