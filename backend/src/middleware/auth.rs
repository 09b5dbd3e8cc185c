//! Authentication middleware
//!
//! Static API key check for the write endpoint. The key is accepted from the
//! `X-API-Key` header or the `api_key` query parameter.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const API_KEY_PARAM: &str = "api_key";

/// Key presented by the caller, header first
fn presented_key(request: &Request) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        return Some(value.trim().to_string());
    }

    request.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            if name != API_KEY_PARAM {
                return None;
            }
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        })
    })
}

/// Compare digests so the comparison does not depend on where the keys differ
pub fn keys_match(expected: &str, presented: &str) -> bool {
    Sha256::digest(expected.as_bytes()) == Sha256::digest(presented.as_bytes())
}

/// Reject requests without the configured key; open when no key is configured
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    match presented_key(&request) {
        Some(presented) if keys_match(expected, &presented) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request with wrong API key");
            AppError::Unauthorized("Invalid API key".to_string()).into_response()
        }
        None => AppError::Unauthorized("Missing API key".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header(API_KEY_HEADER, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_key_from_header_or_query() {
        assert_eq!(presented_key(&request("/generate", Some("abc"))), Some("abc".to_string()));
        assert_eq!(
            presented_key(&request("/generate?x=1&api_key=s%20ecret", None)),
            Some("s ecret".to_string())
        );
        assert_eq!(presented_key(&request("/generate?apikey=nope", None)), None);
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "Secret"));
        assert!(!keys_match("secret", ""));
    }
}
