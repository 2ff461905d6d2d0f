use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use privtx::{
    crypto::PublicKey,
    identifiers::PrivacyGroupId,
    privacy_group::PrivacyGroup,
    util::base64::Base64String,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivacyGroupRequest {
    pub from: PublicKey,
    pub members: Vec<PublicKey>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub seed: Option<Base64String>,
}

#[derive(Debug, Deserialize)]
pub struct FindPrivacyGroupRequest {
    pub addresses: Vec<PublicKey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievePrivacyGroupRequest {
    pub privacy_group_id: PrivacyGroupId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePrivacyGroupRequest {
    pub privacy_group_id: PrivacyGroupId,
    pub from: PublicKey,
}

#[instrument(skip_all)]
pub async fn push_privacy_group(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state.groups.store_privacy_group(&body)?;
    Ok(StatusCode::OK)
}

#[instrument(skip_all, fields(name = %request.name))]
pub async fn create_privacy_group(
    State(state): State<AppState>,
    Json(request): Json<CreatePrivacyGroupRequest>,
) -> Result<Json<PrivacyGroup>, ApiError> {
    let group = state
        .groups
        .create_privacy_group(
            &request.name,
            &request.description,
            &request.from,
            &request.members,
            request.seed.map(|seed| seed.to_vec()),
        )
        .await?;

    Ok(Json(group))
}

pub async fn find_privacy_group(
    State(state): State<AppState>,
    Json(request): Json<FindPrivacyGroupRequest>,
) -> Result<Json<Vec<PrivacyGroup>>, ApiError> {
    Ok(Json(state.groups.find_privacy_group(&request.addresses)?))
}

pub async fn retrieve_privacy_group(
    State(state): State<AppState>,
    Json(request): Json<RetrievePrivacyGroupRequest>,
) -> Result<Json<PrivacyGroup>, ApiError> {
    Ok(Json(
        state.groups.retrieve_privacy_group(&request.privacy_group_id)?,
    ))
}

#[instrument(skip_all, fields(id = %request.privacy_group_id))]
pub async fn delete_privacy_group(
    State(state): State<AppState>,
    Json(request): Json<DeletePrivacyGroupRequest>,
) -> Result<Json<PrivacyGroupId>, ApiError> {
    let group = state
        .groups
        .delete_privacy_group(&request.from, &request.privacy_group_id)
        .await?;

    Ok(Json(group.id))
}
