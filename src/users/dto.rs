use serde::{Deserialize, Serialize};

use crate::store::{Photo, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Form fields for login. Missing fields are empty and simply fail to match.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Full replacement of a user's editable fields. `id` must name the caller.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub photos: Vec<Photo>,
}

impl PublicUser {
    pub fn new(user: User, photos: Vec<Photo>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            photos,
        }
    }
}
