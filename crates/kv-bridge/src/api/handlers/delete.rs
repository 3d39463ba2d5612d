//! Delete-Key Handler
//!
//! The existence check and the delete are two separate backend calls. A
//! concurrent delete of the same key between them is possible; the backend
//! stays the authority and the second delete is a no-op.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method, Uri},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{log_request, AppState};
use crate::api::error::ApiError;
use crate::core::{check_content_type, check_method, JSON_MEDIA_TYPE};

const PARSE_ERROR: &str = "Can't parse key";

/// Body of a delete request
#[derive(Debug, Deserialize)]
pub struct DeleteKeyRequest {
    #[serde(default)]
    pub key: String,
}

/// Decode the first JSON value of the body; anything after it is ignored
fn decode_first(bytes: &[u8]) -> Result<DeleteKeyRequest, String> {
    match serde_json::Deserializer::from_slice(bytes)
        .into_iter::<DeleteKeyRequest>()
        .next()
    {
        Some(Ok(request)) => Ok(request),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("empty body".to_string()),
    }
}

/// Remove a key
///
/// POST /del_key with `{"key": "<key>"}`
pub async fn del_key(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    log_request(&uri, &method);

    check_method(&method, &Method::POST)?;
    check_content_type(&headers, JSON_MEDIA_TYPE)?;

    let request = body
        .map_err(|e| e.to_string())
        .and_then(|bytes| decode_first(&bytes))
        .map_err(|e| {
            debug!(error = %e, "Failed to parse del_key body");
            ApiError::BadRequest(PARSE_ERROR)
        })?;
    if request.key.is_empty() {
        return Err(ApiError::BadRequest(PARSE_ERROR));
    }
    let key = request.key;

    match state.store.exists(&key).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::NotFound("Key doesn't exist")),
        Err(e) => {
            error!(key = %key, error = %e, "An error occurred while executing exists");
            return Err(e.into());
        }
    }

    if let Err(e) = state.store.delete(&key).await {
        error!(key = %key, error = %e, "An error occurred while executing delete");
        return Err(e.into());
    }

    info!(key = %key, "Removed key");
    Ok(format!("Successfully removed {}", key))
}
