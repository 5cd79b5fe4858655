use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::AppState;
use crate::models::User;

/// The authenticated user a request runs on behalf of
#[derive(Debug, Clone)]
pub struct Actor(pub User);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Rejects requests without a valid bearer token and makes the [`Actor`]
/// available to handlers
pub async fn require_actor(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or(ApiError::Unauthenticated)?;
    let user = state
        .service
        .authenticate(token)
        .await?
        .ok_or(ApiError::InvalidToken)?;

    tracing::debug!(actor = %user.username, "authenticated");
    request.extensions_mut().insert(Actor(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    #[rstest]
    #[case("Bearer abc123", Some("abc123"))]
    #[case("bearer   abc123 ", Some("abc123"))]
    #[case("Basic abc123", None)]
    #[case("Bearer ", None)]
    #[case("abc123", None)]
    fn parses_bearer_scheme(#[case] raw: &str, #[case] expected: Option<&str>) {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(raw).unwrap());
        assert_eq!(bearer_token(&headers), expected);
    }

    #[test]
    fn missing_header_has_no_token() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
