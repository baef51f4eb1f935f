use axum::{
    extract::{Path, State},
    response::Response,
};
use serde::{Deserialize, Serialize};

use super::Urls;
use crate::api::{JsonBody, created, success};
use crate::error::{AppError, ValidationError};
use crate::handler::{AppState, CurrentUser};
use crate::id::{CategoryId, TagId, UserUrlId};
use crate::label::LabelId;
use crate::model::{Metadata, MetadataInput};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddUrlBody {
    pub metadata: MetadataInput,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelIdsBody {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelsUpdated<L> {
    attached: Vec<L>,
    detached: Vec<L>,
}

fn parse_ids<L: LabelId>(raw: &[String]) -> Result<Vec<L>, ValidationError> {
    raw.iter().map(|id| L::parse(id)).collect()
}

pub async fn add_url(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    JsonBody(body): JsonBody<AddUrlBody>,
) -> Result<Response, AppError> {
    let metadata = Metadata::try_from(body.metadata)?;
    let tag_ids = parse_ids::<TagId>(&body.tag_ids)?;
    let category_ids = parse_ids::<CategoryId>(&body.category_ids)?;

    let added = Urls::new(&state.db)
        .add_url(&user_id, &metadata, &tag_ids, &category_ids)
        .await?;
    Ok(created(added))
}

pub async fn list_labels<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user_url_id = UserUrlId::parse(&id)?;
    let labels = Urls::new(&state.db).list_labels::<L>(&user_id, &user_url_id).await?;
    Ok(success(labels))
}

pub async fn update_labels<L: LabelId>(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<LabelIdsBody>,
) -> Result<Response, AppError> {
    let user_url_id = UserUrlId::parse(&id)?;
    let ids = parse_ids::<L>(&body.ids)?;

    let delta = Urls::new(&state.db)
        .update_labels(&user_id, &user_url_id, &ids)
        .await?;
    Ok(success(LabelsUpdated {
        attached: delta.to_attach,
        detached: delta.to_detach,
    }))
}
