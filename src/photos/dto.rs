use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhotoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub photo_url: String,
    /// Declared owner; must be the caller.
    pub user_id: Option<i64>,
}

/// Only these three fields are ever written on update; `id` and `userId` in
/// the body are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePhotoRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedPhotoResponse {
    pub message: String,
    pub id: i64,
}
