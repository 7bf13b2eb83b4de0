use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::debug;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::identity;

/// Extract and validate the bearer token, then attach its `Claims` to the
/// request. Anything short of a valid token is a 403.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|e| {
        debug!("Rejected request without usable bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    let claims = identity::decode_token(&state.jwt_secret, bearer.token()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
