//! Request validation for the bridge
//!
//! Method and content-type checks shared by every handler. The media-type
//! matching is a pure function so it can be exercised without a server.

use axum::http::{header::CONTENT_TYPE, HeaderMap, Method};
use tracing::debug;

use crate::api::error::ApiError;

/// Media type assumed when a request carries no `Content-Type` header
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Media type accepted by the write endpoints
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Reject the request unless it uses `expected`
pub fn check_method(method: &Method, expected: &Method) -> Result<(), ApiError> {
    if method == expected {
        Ok(())
    } else {
        debug!(method = %method, expected = %expected, "Rejecting request method");
        Err(ApiError::MethodNotAllowed)
    }
}

/// Reject the request unless its declared content type includes `expected`
///
/// A header value that is not visible ASCII counts as unparseable.
pub fn check_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let declared = match headers.get(CONTENT_TYPE) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(text) => Some(text),
            Err(_) => return Err(ApiError::UnsupportedMediaType),
        },
    };

    if has_content_type(declared, expected) {
        Ok(())
    } else {
        debug!(content_type = ?declared, expected = %expected, "Rejecting content type");
        Err(ApiError::UnsupportedMediaType)
    }
}

/// Check whether a `Content-Type` header value declares `expected`
///
/// * No header means [`DEFAULT_MEDIA_TYPE`].
/// * Otherwise the value is split on `,` and each entry parsed as a media
///   type; any exact match accepts.
/// * Scanning stops at the first entry that fails to parse.
pub fn has_content_type(header: Option<&str>, expected: &str) -> bool {
    let Some(header) = header else {
        return expected == DEFAULT_MEDIA_TYPE;
    };

    for declaration in header.split(',') {
        match parse_media_type(declaration) {
            Some(media_type) if media_type == expected => return true,
            Some(_) => continue,
            None => break,
        }
    }
    false
}

/// Parse `type[/subtype][; param=value]*` into its lowercased essence
///
/// Returns `None` if the type or any parameter is malformed, or if a
/// parameter name repeats.
fn parse_media_type(declaration: &str) -> Option<String> {
    let (base, mut rest) = match declaration.find(';') {
        Some(i) => declaration.split_at(i),
        None => (declaration, ""),
    };

    let essence = base.trim().to_ascii_lowercase();
    if !is_essence(&essence) {
        return None;
    }

    let mut seen: Vec<String> = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        match consume_param(rest) {
            Some((name, remainder)) => {
                if seen.contains(&name) {
                    return None;
                }
                seen.push(name);
                rest = remainder;
            }
            // Trailing `;` is tolerated
            None if rest.trim() == ";" => break,
            None => return None,
        }
    }

    Some(essence)
}

/// A single token, or two tokens joined by `/`
fn is_essence(essence: &str) -> bool {
    let (main, rest) = consume_token(essence);
    if main.is_empty() {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    match rest.strip_prefix('/') {
        Some(rest) => {
            let (sub, rest) = consume_token(rest);
            !sub.is_empty() && rest.is_empty()
        }
        None => false,
    }
}

/// `; name=value`, returning the lowercased name and what follows
fn consume_param(s: &str) -> Option<(String, &str)> {
    let rest = s.trim_start().strip_prefix(';')?.trim_start();
    let (name, rest) = consume_token(rest);
    if name.is_empty() {
        return None;
    }
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let rest = consume_value(rest)?;
    Some((name.to_ascii_lowercase(), rest))
}

/// Skip a token or a quoted string, returning what follows
///
/// Inside quotes a backslash escapes the next character only when that
/// character is a tspecial; otherwise it is kept literally. Bare CR or LF
/// and a missing closing quote are errors.
fn consume_value(s: &str) -> Option<&str> {
    let Some(quoted) = s.strip_prefix('"') else {
        let (token, rest) = consume_token(s);
        return (!token.is_empty()).then_some(rest);
    };

    let bytes = quoted.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Some(&quoted[i + 1..]),
            b'\\' if bytes.get(i + 1).is_some_and(|&b| is_tspecial(b as char)) => i += 2,
            b'\r' | b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

/// Split off the longest leading run of token characters
fn consume_token(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_token_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

/// RFC 2045 `token` character
fn is_token_char(c: char) -> bool {
    c > ' ' && c < '\x7f' && !is_tspecial(c)
}

fn is_tspecial(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '='
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    #[test]
    fn test_missing_header_defaults_to_octet_stream() {
        assert!(has_content_type(None, DEFAULT_MEDIA_TYPE));
        assert!(!has_content_type(None, JSON_MEDIA_TYPE));
    }

    #[test]
    fn test_exact_match() {
        assert!(has_content_type(Some("application/json"), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("text/plain"), JSON_MEDIA_TYPE));
    }

    #[test]
    fn test_parameters_are_ignored() {
        assert!(has_content_type(
            Some("application/json; charset=utf-8"),
            JSON_MEDIA_TYPE
        ));
        assert!(has_content_type(
            Some("application/json;charset=\"utf-8\""),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_type_is_case_insensitive() {
        assert!(has_content_type(Some("Application/JSON"), JSON_MEDIA_TYPE));
    }

    #[test]
    fn test_any_declaration_may_match() {
        assert!(has_content_type(
            Some("text/plain, application/json"),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_bare_token_is_a_valid_declaration() {
        assert!(has_content_type(Some("text"), "text"));
        assert!(has_content_type(
            Some("text, application/json"),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_scan_stops_at_first_unparseable_entry() {
        assert!(!has_content_type(
            Some("/json, application/json"),
            JSON_MEDIA_TYPE
        ));
        assert!(!has_content_type(
            Some("application/, application/json"),
            JSON_MEDIA_TYPE
        ));
        // A match before the bad entry still wins
        assert!(has_content_type(
            Some("application/json, /json"),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_quoted_parameter_values() {
        assert!(has_content_type(
            Some(r#"application/json; charset="utf\"8""#),
            JSON_MEDIA_TYPE
        ));
        assert!(has_content_type(
            Some(r#"application/json; name="a;b"; charset=utf-8"#),
            JSON_MEDIA_TYPE
        ));
        assert!(has_content_type(Some(r#"application/json; x="""#), JSON_MEDIA_TYPE));
        assert!(!has_content_type(
            Some(r#"application/json; charset="utf-8"#),
            JSON_MEDIA_TYPE
        ));
        assert!(!has_content_type(
            Some("application/json; charset=\"utf\n8\""),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        assert!(!has_content_type(
            Some("application/json; charset=utf-8; CHARSET=latin1"),
            JSON_MEDIA_TYPE
        ));
    }

    #[test]
    fn test_malformed_declarations() {
        assert!(!has_content_type(Some(""), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("application/"), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("application/json; charset"), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("application json"), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("application/json/x"), JSON_MEDIA_TYPE));
        assert!(!has_content_type(Some("application/json; =utf-8"), JSON_MEDIA_TYPE));
    }

    #[test]
    fn test_check_method() {
        assert!(check_method(&Method::POST, &Method::POST).is_ok());
        assert!(matches!(
            check_method(&Method::GET, &Method::POST),
            Err(ApiError::MethodNotAllowed)
        ));
    }

    #[test]
    fn test_check_content_type_headers() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            check_content_type(&headers, JSON_MEDIA_TYPE),
            Err(ApiError::UnsupportedMediaType)
        ));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(check_content_type(&headers, JSON_MEDIA_TYPE).is_ok());

        headers.insert(CONTENT_TYPE, HeaderValue::from_bytes(b"application/\xffjson").unwrap());
        assert!(matches!(
            check_content_type(&headers, JSON_MEDIA_TYPE),
            Err(ApiError::UnsupportedMediaType)
        ));
    }

    proptest! {
        /// Adding parameters never changes the outcome for a well-formed type
        #[test]
        fn prop_parameters_do_not_affect_match(
            main in "[a-z]{1,12}",
            sub in "[a-z0-9.+-]{1,12}",
            value in "[a-z0-9-]{1,8}",
        ) {
            let bare = format!("{}/{}", main, sub);
            let with_params = format!("{}; charset={}", bare, value);

            prop_assert!(has_content_type(Some(&bare), &bare));
            prop_assert!(has_content_type(Some(&with_params), &bare));
        }

        /// Arbitrary header text never panics the parser
        #[test]
        fn prop_arbitrary_header_never_panics(header in ".*") {
            let _ = has_content_type(Some(&header), JSON_MEDIA_TYPE);
        }
    }
}
