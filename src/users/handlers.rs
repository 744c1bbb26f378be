use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, FromRef, Path, State},
    routing::{get, post, put},
    Form, Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::dto::{
    LoginForm, LoginResponse, MessageResponse, PublicUser, RefreshRequest, RegisterRequest,
    UpdateUserRequest,
};
use crate::{
    auth::{
        ensure_owner, owner_from_path,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        CurrentUser, JwtKeys,
    },
    error::ApiError,
    state::AppState,
    store::{NewUser, StoreError},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/refresh", post(refresh))
        .route("/users/:user_id", put(update_user).delete(delete_user))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn require_present(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

fn check_credentials(username: &str, email: &str, password: &str) -> Result<(), ApiError> {
    require_present("username", username)?;
    require_present("email", email)?;
    require_present("password", password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn issue_tokens(keys: &JwtKeys, user_id: i64) -> Result<(String, String), ApiError> {
    let access_token = keys.sign_access(user_id).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user_id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e)
    })?;
    Ok((access_token, refresh_token))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    check_credentials(&payload.username, &payload.email, &payload.password)?;

    let password_hash = hash_password(&payload.password)?;

    // The unique index on email is the only duplicate check.
    let user = state
        .store
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "create user failed");
            ApiError::from(e)
        })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(Json(MessageResponse::new("User registered")))
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Form(form) = form?;
    let invalid = || ApiError::Unauthenticated("Login failed".into());

    let user = match state.store.find_user_by_email(&form.email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!(email = %form.email, "login unknown email");
            return Err(invalid());
        }
        Err(e) => {
            error!(error = %e, "find_user_by_email failed");
            return Err(e.into());
        }
    };

    if !verify_password(&form.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid());
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = issue_tokens(&keys, user.id)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login succeeded".into(),
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::Unauthenticated("Invalid or expired refresh token".into())
    })?;

    let user = match state.store.find_user(claims.sub).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            return Err(ApiError::Unauthenticated("User not found".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let (access_token, refresh_token) = issue_tokens(&keys, user.id)?;
    Ok(Json(LoginResponse {
        message: "Token refreshed".into(),
        access_token,
        refresh_token,
    }))
}

#[instrument(skip(state, user), fields(user_id = user.id))]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PublicUser>, ApiError> {
    let photos = state.store.find_photos(Some(user.id)).await?;
    Ok(Json(PublicUser::new(user, photos)))
}

#[instrument(skip(state, actor, payload), fields(actor_id = actor.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;

    ensure_owner(&actor, owner_from_path(&user_id), "update another user")?;
    ensure_owner(&actor, payload.id, "update another user")?;
    check_credentials(&payload.username, &payload.email, &payload.password)?;

    let password_hash = hash_password(&payload.password)?;

    let mut tx = state.store.begin().await?;
    let mut user = tx.lock_user(actor.id).await?;
    user.username = payload.username;
    user.email = payload.email;
    user.password_hash = password_hash;
    tx.save_user(&user).await?;
    tx.commit().await?;

    info!(user_id = user.id, "user updated");
    Ok(Json(MessageResponse::new("User updated")))
}

#[instrument(skip(state, actor), fields(actor_id = actor.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    ensure_owner(&actor, owner_from_path(&user_id), "delete another user")?;

    state.store.delete_user(actor.id).await?;

    info!(user_id = actor.id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
