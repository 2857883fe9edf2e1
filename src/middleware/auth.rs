use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::ApiError;

/// JWT authentication middleware: validates the token and injects `AuthUser`
/// into request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match extract_token(&headers) {
        Ok(token) => token,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    match state.verifier.verify(&token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Rejected REST token: {}", e);
            ApiError::unauthorized("Invalid token").into_response()
        }
    }
}

/// Bearer header first, then the `token` cookie set by the login flow
fn extract_token(headers: &HeaderMap) -> Result<String, &'static str> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| "Invalid Authorization header format")?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or("Authorization header must use Bearer token format")?;
        if token.trim().is_empty() {
            return Err("Empty JWT token");
        }
        return Ok(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or("Authentication required")
}
