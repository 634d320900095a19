//! Session cookie middleware
//!
//! Reads the session cookie, sanitizes it and makes the id available two
//! ways: as a request extension (see [`CurrentSession`]) and as the ambient
//! context id for the rest of the request. Session data is not loaded here.

use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::COOKIE, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use phpsess_core::{sanitize_session_id, SessionId};
use phpsess_manager::scope;
use std::convert::Infallible;
use tracing::debug;

/// Raw value of cookie `name`, first match wins
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().trim_matches('"').to_string())
        })
}

/// Session context middleware
pub async fn session_cookie_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw = session_cookie(request.headers(), &state.config.cookie_name);
    let session_id = sanitize_session_id(raw.as_deref());

    if let Some(id) = &session_id {
        debug!(session_id = %id.redacted(), "Session context set");
        request.extensions_mut().insert(id.clone());
    }

    scope(session_id, next.run(request)).await
}

/// The request's sanitized session id, if it carried one
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<SessionId>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(parts.extensions.get::<SessionId>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_static(cookie));
        }
        headers
    }

    #[test]
    fn test_session_cookie_lookup() {
        let headers = headers(&["theme=dark; PHPSESSID=abc123; lang=en"]);
        assert_eq!(
            session_cookie(&headers, "PHPSESSID"),
            Some("abc123".to_string())
        );
        assert_eq!(session_cookie(&headers, "lang"), Some("en".to_string()));
        assert_eq!(session_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_session_cookie_across_headers() {
        let headers = headers(&["theme=dark", "PHPSESSID=\"quoted\""]);
        assert_eq!(
            session_cookie(&headers, "PHPSESSID"),
            Some("quoted".to_string())
        );
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let headers = headers(&["XPHPSESSID=abc; PHPSESSIDX=def"]);
        assert_eq!(session_cookie(&headers, "PHPSESSID"), None);
    }
}
