use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::{error, warn};

use super::jwt::JwtKeys;
use crate::{
    error::ApiError,
    state::AppState,
    store::{RecordStore, StoreError, User},
};

/// Resolves the caller of a request to a live user.
///
/// The caller proves who they are with an access token in the
/// `Authorization: Bearer` header; the subject must still exist in the store.
pub async fn resolve(
    store: &dyn RecordStore,
    keys: &JwtKeys,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("Missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| ApiError::Unauthenticated("Invalid Authorization header".into()))?;

    let claims = keys.verify_access(token).map_err(|e| {
        warn!(error = %e, "rejected token");
        ApiError::Unauthenticated("Invalid or expired token".into())
    })?;

    match store.find_user(claims.sub).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => {
            warn!(user_id = claims.sub, "token subject no longer exists");
            Err(ApiError::Unauthenticated("You must log in first".into()))
        }
        Err(e) => {
            error!(error = %e, user_id = claims.sub, "identity lookup failed");
            Err(e.into())
        }
    }
}

/// The resolved caller, available to any handler that names it.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);
        let user = resolve(state.store.as_ref(), &keys, &parts.headers).await?;
        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::JwtConfig,
        store::{MemoryStore, NewUser},
    };
    use axum::http::HeaderValue;

    fn keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "test".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                username: "a".into(),
                email: "a@x".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn resolves_valid_access_token() {
        let (store, user) = seeded().await;
        let keys = keys();
        let token = keys.sign_access(user.id).unwrap();
        let resolved = resolve(&store, &keys, &bearer(&token)).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let (store, _) = seeded().await;
        let err = resolve(&store, &keys(), &HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_identity() {
        let (store, user) = seeded().await;
        let keys = keys();
        let token = keys.sign_refresh(user.id).unwrap();
        let err = resolve(&store, &keys, &bearer(&token)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() {
        let (store, _) = seeded().await;
        let keys = keys();
        let token = keys.sign_access(999).unwrap();
        let err = resolve(&store, &keys, &bearer(&token)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn deleted_user_is_unauthenticated() {
        let (store, user) = seeded().await;
        store.delete_user(user.id).await.unwrap();
        let keys = keys();
        let token = keys.sign_access(user.id).unwrap();
        let err = resolve(&store, &keys, &bearer(&token)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthenticated(_)));
    }
}
