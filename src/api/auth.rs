//! Login, registration, and logout endpoints.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use std::sync::Arc;

use crate::db::{AuthResponse, LoginRequest, RegisterRequest, SessionUser};
use crate::session::SessionStore;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }

    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    if let Err(e) = validate_name(&req.name) {
        errors.add("name", e);
    }

    errors.finish()
}

/// Login endpoint. On success the session cookie is set alongside the
/// JSON body, so the client session survives a reload.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let user = state.auth.login(&request.email, &request.password).await?;

    let mut session = SessionStore::new();
    let jar = session.set_user(jar, user.clone());

    Ok((jar, Json(AuthResponse {
        success: true,
        user,
    })))
}

/// Registration endpoint. A duplicate email surfaces as 409; the UNIQUE
/// constraint at insert time is the conflict signal, so two racing
/// registrations resolve in the store, not here.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_register_request(&request)?;

    let user = state
        .auth
        .register(&request.email, &request.password, request.name.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user: SessionUser::from(user),
        }),
    ))
}

/// Logout endpoint. Only erases the cookie; there is no server-side
/// session to revoke.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    let mut session = SessionStore::new();
    let jar = session.logout(jar);
    (jar, Json(LogoutResponse { success: true }))
}
