use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use stockwatch_auth::{AuthError, CredentialValidator, Credentials};

use crate::context::PrincipalContext;

pub const AUTH_REALM: &str = "stockwatch";

#[derive(Clone)]
pub struct AuthState {
    pub validator: Arc<dyn CredentialValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let credentials = extract_basic(req.headers()).map_err(|e| {
        tracing::debug!(error = %e, "rejected request credentials");
        unauthorized()
    })?;

    state.validator.validate(&credentials).map_err(|_e| {
        tracing::warn!(username = %credentials.username, "invalid credentials");
        unauthorized()
    })?;

    req.extensions_mut()
        .insert(PrincipalContext::new(credentials.username));

    Ok(next.run(req).await)
}

fn extract_basic(headers: &HeaderMap) -> Result<Credentials, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::WrongScheme)?
        .to_str()
        .map_err(|_| AuthError::Encoding)?;

    Credentials::from_authorization(header)
}

fn unauthorized() -> Response {
    let challenge = format!("Basic realm=\"{AUTH_REALM}\"");
    let mut res = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        res.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    res
}
