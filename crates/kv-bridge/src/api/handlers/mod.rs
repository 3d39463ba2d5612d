//! API request handlers
//!
//! Each handler validates its own method and content type, so routes are
//! registered with `any` and the 405/415 bodies stay under our control.

pub mod delete;
pub mod get;
pub mod set;

pub use delete::{del_key, DeleteKeyRequest};
pub use get::{first_key, get_key, QueryPairs};
pub use set::set_key;

use axum::http::{Method, Uri};
use std::sync::Arc;
use tracing::info;

use crate::storage::KvStore;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Backend store; one shared client for every request
    pub store: Arc<dyn KvStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

fn log_request(uri: &Uri, method: &Method) {
    info!(url = %uri.path(), method = %method, "Request");
}
