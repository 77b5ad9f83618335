use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use super::{check_password, optional_text, required_text};
use crate::{
    AppState,
    auth::{AuthUser, hash_password, is_valid_email, verify_password},
    error::{ApiError, ApiResult},
    extract::ApiJson,
    models::{
        AuthResponse, ErrorBody, LoginRequest, MessageResponse, NewUser, RegisterRequest,
        UpdateProfileRequest, User, UserChanges,
    },
};

/// register
///
/// [Public Route] Creates an account and returns it together with a session token.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Invalid input or email taken", body = ErrorBody)
    )
)]
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let name = required_text(&payload.name, "name")?;
    let email = required_text(&payload.email, "email")?;
    if !is_valid_email(&email) {
        return Err(ApiError::validation("The email must be a valid email address"));
    }
    check_password(&payload.password)?;

    let new_user = NewUser {
        name,
        email,
        password_hash: hash_password(&payload.password)?,
        filiere: optional_text(payload.filiere, "filiere")?,
        annee: optional_text(payload.annee, "annee")?,
    };

    let user = state.repo.create_user(new_user).await?;
    let token = state.tokens.issue_token(&user)?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            user,
            token,
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a session token. Unknown email and wrong
/// password are indistinguishable to the client.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let email = required_text(&payload.email, "email")?;
    if payload.password.is_empty() {
        return Err(ApiError::validation("The password field is required"));
    }

    let user = state
        .repo
        .find_user_by_email(&email)
        .await?
        .filter(|user| verify_password(&payload.password, &user.password_hash))
        .ok_or_else(|| {
            tracing::warn!("failed login attempt");
            ApiError::Unauthorized("Invalid credentials".to_string())
        })?;

    let token = state.tokens.issue_token(&user)?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user,
        token,
    }))
}

/// logout
///
/// [Authenticated Route] Revokes every token issued to the caller so far.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn logout(auth: AuthUser, State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    state.repo.bump_token_version(auth.id).await?;
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// me
///
/// [Authenticated Route] The caller's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn me(AuthUser { id, .. }: AuthUser, State(state): State<AppState>) -> ApiResult<Json<User>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

/// update_profile
///
/// [Authenticated Route] Partial profile update. A blank `filiere` or `annee` clears it;
/// a new password is re-hashed.
#[utoipa::path(
    put,
    path = "/user",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Invalid input", body = ErrorBody)
    )
)]
#[instrument(skip_all, fields(user_id = %auth.id))]
pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let password_hash = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => {
            check_password(password)?;
            Some(hash_password(password)?)
        }
        _ => None,
    };

    let changes = UserChanges {
        name: payload
            .name
            .as_deref()
            .map(|name| required_text(name, "name"))
            .transpose()?,
        filiere: payload
            .filiere
            .map(|value| optional_text(value, "filiere"))
            .transpose()?,
        annee: payload
            .annee
            .map(|value| optional_text(value, "annee"))
            .transpose()?,
        password_hash,
    };

    let user = state
        .repo
        .update_user(auth.id, changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}
