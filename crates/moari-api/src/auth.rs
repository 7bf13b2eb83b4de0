use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{debug, error};

use moari_db::Database;
use moari_types::api::{
    GoogleLoginRequest, LoginRequest, SignupRequest, SignupResponse, TokenResponse,
};

use crate::error::ApiError;
use crate::identity::{self, GoogleVerifier};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    /// `None` disables Google sign-in.
    pub google: Option<GoogleVerifier>,
}

/// Run blocking DB work off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal("서버 오류가 발생했습니다.", e)
        })?
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    debug!("Signup request for {:?}", req.email);

    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(ApiError::Validation("이메일과 비밀번호는 필수입니다.".into()));
    };
    let display_name = req.display_name;

    let uid = run_db(&state, move |db| {
        identity::register_user(db, &email, &password, display_name.as_deref())
            .map_err(|e| ApiError::bad_request(e.user_message(), &e))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "회원가입 완료!".into(),
            uid,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (required(req.email), required(req.password)) else {
        return Err(ApiError::Validation("이메일과 비밀번호는 필수입니다.".into()));
    };

    let user = run_db(&state, move |db| {
        identity::check_credentials(db, &email, &password)
            .map_err(|e| ApiError::bad_request("Error logging in", e))
    })
    .await?
    .ok_or_else(|| ApiError::rejected("INVALID_LOGIN_CREDENTIALS"))?;

    let token = identity::issue_token(&state.jwt_secret, &user.id, &user.email, state.token_ttl)
        .map_err(|e| ApiError::bad_request("Error logging in", e))?;

    Ok(Json(TokenResponse { token }))
}

pub async fn google(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<GoogleLoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    const FAILED: &str = "Error verifying Google token";

    let id_token = required(req.id_token)
        .ok_or_else(|| ApiError::bad_request(FAILED, "idToken is required"))?;
    let verifier = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::bad_request(FAILED, "Google sign-in is not configured"))?;

    let google_identity = verifier
        .verify(&id_token)
        .await
        .map_err(|e| ApiError::bad_request(FAILED, format!("{:#}", e)))?;

    let user = run_db(&state, move |db| {
        identity::sign_in_federated(db, &google_identity)
            .map_err(|e| ApiError::bad_request(FAILED, e))
    })
    .await?;

    let token = identity::issue_token(&state.jwt_secret, &user.id, &user.email, state.token_ttl)
        .map_err(|e| ApiError::bad_request(FAILED, e))?;

    Ok(Json(TokenResponse { token }))
}

