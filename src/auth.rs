use crate::error::{AppError, AppResult};
use axum::http::HeaderMap;
use std::sync::Arc;

/// Shared-secret bearer auth for the API surface. The gateway key is fixed at
/// startup; there are no per-user keys.
#[derive(Clone)]
pub struct AuthState {
    gateway_api_key: Arc<str>,
}

impl AuthState {
    pub fn new(gateway_api_key: &str) -> Self {
        Self {
            gateway_api_key: Arc::from(gateway_api_key),
        }
    }

    pub fn require_bearer(&self, headers: &HeaderMap) -> AppResult<()> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Authorization header is not a bearer token"))?;
        if token != self.gateway_api_key.as_ref() {
            return Err(AppError::unauthorized("invalid API key"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_matching_bearer_token() {
        let auth = AuthState::new("s3cret");
        assert!(auth.require_bearer(&headers_with("Bearer s3cret")).is_ok());
    }

    #[test]
    fn rejects_missing_wrong_and_malformed_tokens() {
        let auth = AuthState::new("s3cret");
        assert!(auth.require_bearer(&HeaderMap::new()).is_err());
        assert!(auth.require_bearer(&headers_with("Bearer nope")).is_err());
        assert!(auth.require_bearer(&headers_with("s3cret")).is_err());
    }
}
