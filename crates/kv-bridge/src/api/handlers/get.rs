//! Get-Key Handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, Uri},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{log_request, AppState};
use crate::api::error::ApiError;
use crate::core::check_method;

/// Raw query pairs, in the order they appear in the URL
pub type QueryPairs = Vec<(String, String)>;

/// First `key` parameter of the query, if any
///
/// Later repetitions are ignored, so `?key=a&key=b` names `a` and
/// `?key=&key=b` names the empty key.
pub fn first_key(pairs: &[(String, String)]) -> Option<&str> {
    pairs
        .iter()
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.as_str())
}

/// Return the raw value stored under `key`
///
/// GET /get_key?key=<key>
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    query: Result<Query<QueryPairs>, QueryRejection>,
) -> Result<String, ApiError> {
    log_request(&uri, &method);

    check_method(&method, &Method::GET)?;

    let pairs = match query {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            debug!(error = %e, "Failed to parse get_key query");
            return Err(ApiError::BadRequest("Can't parse key"));
        }
    };
    let key = match first_key(&pairs) {
        Some(key) if !key.is_empty() => key,
        _ => return Err(ApiError::BadRequest("Can't parse key")),
    };

    match state.store.get(key).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(ApiError::NotFound("Key not found")),
        Err(e) => {
            error!(key = %key, error = %e, "An error occurred while executing get");
            Err(e.into())
        }
    }
}
