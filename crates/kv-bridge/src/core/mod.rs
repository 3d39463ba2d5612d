//! Core request logic for the bridge

mod validation;

pub use validation::{
    check_content_type, check_method, has_content_type, DEFAULT_MEDIA_TYPE, JSON_MEDIA_TYPE,
};
