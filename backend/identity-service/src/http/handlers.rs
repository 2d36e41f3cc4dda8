/// Identity HTTP handlers
use super::HttpState;
use crate::error::IdentityError;
use crate::services::{ProfileUpdate, RegisterRequest};
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

type HandlerResult = Result<HttpResponse, IdentityError>;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
}

/// POST /api/v1/users
pub async fn register(
    state: web::Data<HttpState>,
    body: web::Json<RegisterRequest>,
) -> HandlerResult {
    let scope = state.scope();
    let profile = scope
        .run(state.identity.register(body.into_inner(), scope.token()))
        .await?;
    Ok(HttpResponse::Created().json(profile))
}

/// POST /api/v1/users/activate
pub async fn activate(
    state: web::Data<HttpState>,
    body: web::Json<ActivateRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(state.identity.activate_with_token(&body.token, scope.token()))
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/v1/auth/login
pub async fn login(state: web::Data<HttpState>, body: web::Json<LoginRequest>) -> HandlerResult {
    let scope = state.scope();
    let tokens = scope
        .run(state.identity.login(&body.email, &body.password, scope.token()))
        .await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    state: web::Data<HttpState>,
    body: web::Json<RefreshRequest>,
) -> HandlerResult {
    let scope = state.scope();
    let access_token = scope
        .run(state.identity.refresh(&body.refresh_token, scope.token()))
        .await?;
    Ok(HttpResponse::Ok().json(RefreshResponse { access_token }))
}

/// POST /api/v1/auth/password-reset
pub async fn reset_password(
    state: web::Data<HttpState>,
    body: web::Json<PasswordResetRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(state.identity.reset_password(&body.email, scope.token()))
        .await?;
    Ok(HttpResponse::Accepted().finish())
}

/// POST /api/v1/auth/logout
pub async fn logout(
    state: web::Data<HttpState>,
    user: AuthenticatedUser,
    body: web::Json<LogoutRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(
            state
                .identity
                .logout(&user.user_id, &body.refresh_token, scope.token()),
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/v1/users/me
pub async fn get_profile(state: web::Data<HttpState>, user: AuthenticatedUser) -> HandlerResult {
    let scope = state.scope();
    let profile = scope
        .run(state.identity.profile(&user.user_id, scope.token()))
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/v1/users/me
pub async fn update_profile(
    state: web::Data<HttpState>,
    user: AuthenticatedUser,
    body: web::Json<ProfileUpdate>,
) -> HandlerResult {
    let scope = state.scope();
    let profile = scope
        .run(
            state
                .identity
                .update_profile(&user.user_id, body.into_inner(), scope.token()),
        )
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// DELETE /api/v1/users/me
pub async fn delete_account(
    state: web::Data<HttpState>,
    user: AuthenticatedUser,
    body: web::Json<DeleteAccountRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(
            state
                .identity
                .delete(&user.user_id, &body.password, scope.token()),
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/v1/users/me/password
///
/// Authorized by the access token alone. Use `PATCH /users/me` with a
/// `password` block to require the current password.
pub async fn change_password(
    state: web::Data<HttpState>,
    user: AuthenticatedUser,
    body: web::Json<ChangePasswordRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(
            state
                .identity
                .change_password(&user.user_id, &body.new_password, scope.token()),
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/v1/users/me/email
pub async fn change_email(
    state: web::Data<HttpState>,
    user: AuthenticatedUser,
    body: web::Json<ChangeEmailRequest>,
) -> HandlerResult {
    let scope = state.scope();
    scope
        .run(
            state
                .identity
                .change_email(&user.user_id, &body.email, scope.token()),
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
