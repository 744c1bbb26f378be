use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRef, Path, State,
    },
    http::HeaderMap,
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreatePhotoRequest, CreatedPhotoResponse, UpdatePhotoRequest};
use crate::{
    auth::{ensure_owner, resolve, CurrentUser, JwtKeys},
    config::ListScope,
    error::ApiError,
    state::AppState,
    store::{NewPhoto, Photo, StoreError},
    users::MessageResponse,
};

pub fn photo_routes() -> Router<AppState> {
    Router::new()
        .route("/photos", get(list_photos).post(create_photo))
        .route("/photos/:photo_id", put(update_photo).delete(delete_photo))
}

fn photo_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::NotFound("Photo not found".into()),
        other => other.into(),
    }
}

#[instrument(skip(state, actor, payload), fields(actor_id = actor.id))]
pub async fn create_photo(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    payload: Result<Json<CreatePhotoRequest>, JsonRejection>,
) -> Result<Json<CreatedPhotoResponse>, ApiError> {
    let Json(payload) = payload?;
    ensure_owner(&actor, payload.user_id, "add a photo for another user")?;

    let photo = state
        .store
        .create_photo(NewPhoto {
            title: payload.title,
            caption: payload.caption,
            photo_url: payload.photo_url,
            user_id: actor.id,
        })
        .await?;

    info!(photo_id = photo.id, "photo created");
    Ok(Json(CreatedPhotoResponse {
        message: "Photo added".into(),
        id: photo.id,
    }))
}

/// The caller is only resolved under `ListScope::Owned`. A missing token is
/// 401 there, and a store failure during the lookup keeps its own status.
#[instrument(skip(state, headers))]
pub async fn list_photos(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Photo>>, ApiError> {
    let owner = match state.config.list_scope {
        ListScope::All => None,
        ListScope::Owned => {
            let keys = JwtKeys::from_ref(&state);
            let viewer = resolve(state.store.as_ref(), &keys, &headers).await?;
            Some(viewer.id)
        }
    };
    let photos = state.store.find_photos(owner).await?;
    Ok(Json(photos))
}

#[instrument(skip(state, actor, photo_id, payload), fields(actor_id = actor.id))]
pub async fn update_photo(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    photo_id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdatePhotoRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(photo_id) = photo_id?;
    let Json(payload) = payload?;

    let mut tx = state.store.begin().await?;
    let mut photo = tx.lock_photo(photo_id).await.map_err(photo_not_found)?;
    // Checked against the stored owner, never the request body.
    ensure_owner(&actor, Some(photo.user_id), "update this photo")?;

    photo.title = payload.title;
    photo.caption = payload.caption;
    photo.photo_url = payload.photo_url;
    tx.save_photo(&photo).await.map_err(photo_not_found)?;
    tx.commit().await?;

    info!(photo_id, "photo updated");
    Ok(Json(MessageResponse::new("Photo updated")))
}

#[instrument(skip(state, actor, photo_id), fields(actor_id = actor.id))]
pub async fn delete_photo(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    photo_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(photo_id) = photo_id?;

    let mut tx = state.store.begin().await?;
    let photo = tx.lock_photo(photo_id).await.map_err(photo_not_found)?;
    ensure_owner(&actor, Some(photo.user_id), "delete this photo")?;

    tx.delete_photo(photo.id).await.map_err(photo_not_found)?;
    tx.commit().await?;

    info!(photo_id, "photo deleted");
    Ok(Json(MessageResponse::new("Photo deleted")))
}
