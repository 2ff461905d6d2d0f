use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use privtx::{
    crypto::PublicKey,
    identifiers::{MessageHash, PrivacyGroupId},
    transaction::{ResendRequest, ResendResponse},
    util::base64::Base64String,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(default)]
    pub from: Option<PublicKey>,
    #[serde(default)]
    pub to: Vec<PublicKey>,
    pub payload: Base64String,
    /// When set, the group's members are the recipients.
    #[serde(default)]
    pub privacy_group_id: Option<PrivacyGroupId>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResponse {
    pub key: MessageHash,
}

#[derive(Debug, Deserialize)]
pub struct StoreRawRequest {
    #[serde(default)]
    pub from: Option<PublicKey>,
    pub payload: Base64String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSignedRequest {
    pub hash: MessageHash,
    #[serde(default)]
    pub to: Vec<PublicKey>,
    /// When set, the group's members are the recipients.
    #[serde(default)]
    pub privacy_group_id: Option<PrivacyGroupId>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    #[serde(default)]
    pub to: Option<PublicKey>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiveResponse {
    pub payload: Base64String,
}

/// Encrypts and distributes a payload. Without a privacy group the sender
/// and recipients form a legacy group.
#[instrument(skip_all)]
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let from = request
        .from
        .unwrap_or_else(|| state.enclave.default_public_key());

    let group = match &request.privacy_group_id {
        Some(id) => state.groups.retrieve_privacy_group(id)?,
        None => state.groups.create_legacy_privacy_group(&from, &request.to)?,
    };
    let recipients: Vec<PublicKey> = if request.privacy_group_id.is_some() {
        group.members.clone()
    } else {
        request.to
    };

    let key = state
        .transactions
        .send(
            Some(from),
            &recipients,
            &request.payload.to_vec(),
            Some(group.id),
        )
        .await?;

    Ok(Json(SendResponse { key }))
}

/// Seals a payload for its sender only. It is sent later through
/// [`send_signed`] under the returned hash.
#[instrument(skip_all)]
pub async fn store_raw(
    State(state): State<AppState>,
    Json(request): Json<StoreRawRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let key = state
        .transactions
        .store_raw(request.from, &request.payload.to_vec())?;

    Ok(Json(SendResponse { key }))
}

#[instrument(skip_all, fields(hash = %request.hash))]
pub async fn send_signed(
    State(state): State<AppState>,
    Json(request): Json<SendSignedRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let recipients = match &request.privacy_group_id {
        Some(id) => state.groups.retrieve_privacy_group(id)?.members,
        None => request.to,
    };

    let key = state
        .transactions
        .send_signed_transaction(&request.hash, &recipients, request.privacy_group_id)
        .await?;

    Ok(Json(SendResponse { key }))
}

#[instrument(skip_all, fields(hash = %hash))]
pub async fn receive(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Query(query): Query<ReceiveQuery>,
) -> Result<Json<ReceiveResponse>, ApiError> {
    let hash = MessageHash::from_base64(&hash)?;
    let payload = state.transactions.receive(&hash, query.to)?;

    Ok(Json(ReceiveResponse {
        payload: Base64String::from_bytes(payload),
    }))
}

/// Stores a payload pushed by another node and answers with its hash.
#[instrument(skip_all)]
pub async fn push(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, String), ApiError> {
    let hash = state.transactions.store_payload(&body)?;

    Ok((StatusCode::CREATED, hash.to_base64()))
}

#[instrument(skip_all, fields(key = %request.public_key))]
pub async fn resend(
    State(state): State<AppState>,
    Json(request): Json<ResendRequest>,
) -> Result<Response, ApiError> {
    Ok(match state.transactions.resend(&request).await? {
        ResendResponse::Published(count) => (StatusCode::OK, count.to_string()).into_response(),
        ResendResponse::Individual(encoded) => encoded.into_response(),
    })
}

#[instrument(skip_all, fields(hash = %hash))]
pub async fn delete(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.transactions.delete(&MessageHash::from_base64(&hash)?)?;

    Ok(StatusCode::NO_CONTENT)
}
