//! Persistence for users and photos.
//!
//! Handlers only see [`RecordStore`] and [`StoreTx`]; the concrete backend is
//! picked at startup and injected through `AppState`.

use std::sync::Arc;

use async_trait::async_trait;

mod memory;
mod postgres;
mod records;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use records::{NewPhoto, NewUser, Photo, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("store backend failure: {0}")]
    Backend(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db)
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                StoreError::ConstraintViolation(db.message().to_string())
            }
            other => StoreError::Backend(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to the user and photo tables.
///
/// Reads never return soft-deleted rows. Writes that depend on a prior read
/// go through [`RecordStore::begin`] so the row stays locked until commit.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: i64) -> StoreResult<User>;
    /// Credential lookup: exact match on email.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<User>;

    async fn create_photo(&self, photo: NewPhoto) -> StoreResult<Photo>;
    async fn find_photo(&self, id: i64) -> StoreResult<Photo>;
    /// All live photos ordered by id, optionally restricted to one owner.
    async fn find_photos(&self, owner: Option<i64>) -> StoreResult<Vec<Photo>>;

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        tx.delete_user(id).await?;
        tx.commit().await
    }

    async fn delete_photo(&self, id: i64) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        tx.delete_photo(id).await?;
        tx.commit().await
    }
}

/// A unit of work. Dropping it without calling `commit` discards every
/// write made through it.
#[async_trait]
pub trait StoreTx: Send {
    async fn lock_user(&mut self, id: i64) -> StoreResult<User>;
    /// Overwrites username, email and password hash.
    async fn save_user(&mut self, user: &User) -> StoreResult<User>;
    async fn delete_user(&mut self, id: i64) -> StoreResult<()>;

    async fn lock_photo(&mut self, id: i64) -> StoreResult<Photo>;
    /// Overwrites title, caption and url. Owner and id are never written.
    async fn save_photo(&mut self, photo: &Photo) -> StoreResult<Photo>;
    async fn delete_photo(&mut self, id: i64) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

pub type StoreState = Arc<dyn RecordStore>;
