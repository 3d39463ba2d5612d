//! Set-Key Handler
//!
//! POST /set_key with a JSON object of string pairs. Pairs are written one at
//! a time; the first backend failure aborts the request with earlier pairs
//! already committed.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method, Uri},
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{log_request, AppState};
use crate::api::error::ApiError;
use crate::core::{check_content_type, check_method, JSON_MEDIA_TYPE};

const PARSE_ERROR: &str = "Can't parse key value";

/// Store every pair of a JSON object
///
/// POST /set_key
///
/// Responds with one `Successfully added <key>=<value>` line per pair.
pub async fn set_key(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<String, ApiError> {
    log_request(&uri, &method);

    check_method(&method, &Method::POST)?;
    check_content_type(&headers, JSON_MEDIA_TYPE)?;

    let body = body.map_err(|e| {
        debug!(error = %e, "Failed to read set_key body");
        ApiError::BadRequest(PARSE_ERROR)
    })?;
    let pairs: BTreeMap<String, String> = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Failed to parse set_key body");
        ApiError::BadRequest(PARSE_ERROR)
    })?;

    let mut response = String::new();
    for (key, value) in &pairs {
        if let Err(e) = state.store.set(key, value).await {
            error!(key = %key, error = %e, "An error occurred while executing set");
            return Err(e.into());
        }
        let _ = writeln!(response, "Successfully added {}={}", key, value);
    }

    info!(count = pairs.len(), "Stored keys");
    Ok(response)
}
