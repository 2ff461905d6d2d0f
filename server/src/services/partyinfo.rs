use axum::{body::Bytes, extract::State, Json};
use privtx::{
    codec::{decode_party_info, encode_party_info},
    party::PartyInfo,
};
use tracing::instrument;

use crate::{error::ApiError, state::AppState};

/// Merges the caller's directory into ours and answers with the result.
#[instrument(skip_all)]
pub async fn post_party_info(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Vec<u8>, ApiError> {
    let incoming = decode_party_info(&body)?;
    let merged = state.directory.handle_incoming(incoming).await?;

    Ok(encode_party_info(&merged))
}

#[instrument(skip_all)]
pub async fn validate(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    Ok(state.directory.unencrypt_sample_data(&body)?)
}

pub async fn get_party_info(State(state): State<AppState>) -> Json<PartyInfo> {
    Json(state.directory.get_party_info())
}
