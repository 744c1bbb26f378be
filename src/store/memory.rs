use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{NewPhoto, NewUser, Photo, RecordStore, StoreError, StoreResult, StoreTx, User};

#[derive(Debug, Default, Clone)]
struct Tables {
    users: BTreeMap<i64, User>,
    photos: BTreeMap<i64, Photo>,
    last_user_id: i64,
    last_photo_id: i64,
}

impl Tables {
    fn live_user(&self, id: i64) -> StoreResult<&User> {
        self.users
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or(StoreError::NotFound)
    }

    fn live_photo(&self, id: i64) -> StoreResult<&Photo> {
        self.photos
            .get(&id)
            .filter(|p| p.deleted_at.is_none())
            .ok_or(StoreError::NotFound)
    }

    fn ensure_email_free(&self, email: &str, except: Option<i64>) -> StoreResult<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.deleted_at.is_none() && u.email == email && Some(u.id) != except);
        if taken {
            return Err(StoreError::ConstraintViolation(format!(
                "email {email} is already registered"
            )));
        }
        Ok(())
    }

    fn insert_user(&mut self, new: NewUser) -> StoreResult<User> {
        self.ensure_email_free(&new.email, None)?;
        self.last_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: self.last_user_id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn insert_photo(&mut self, new: NewPhoto) -> StoreResult<Photo> {
        // Same as the foreign key: the owner row must exist, soft-deleted or not.
        if !self.users.contains_key(&new.user_id) {
            return Err(StoreError::ConstraintViolation(format!(
                "owner {} does not exist",
                new.user_id
            )));
        }
        self.last_photo_id += 1;
        let now = OffsetDateTime::now_utc();
        let photo = Photo {
            id: self.last_photo_id,
            title: new.title,
            caption: new.caption,
            photo_url: new.photo_url,
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.photos.insert(photo.id, photo.clone());
        Ok(photo)
    }

    fn update_user(&mut self, user: &User) -> StoreResult<User> {
        self.live_user(user.id)?;
        self.ensure_email_free(&user.email, Some(user.id))?;
        let stored = self.users.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        stored.username = user.username.clone();
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    fn update_photo(&mut self, photo: &Photo) -> StoreResult<Photo> {
        self.live_photo(photo.id)?;
        let stored = self.photos.get_mut(&photo.id).ok_or(StoreError::NotFound)?;
        stored.title = photo.title.clone();
        stored.caption = photo.caption.clone();
        stored.photo_url = photo.photo_url.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    fn soft_delete_user(&mut self, id: i64) -> StoreResult<()> {
        self.live_user(id)?;
        if let Some(u) = self.users.get_mut(&id) {
            u.deleted_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    fn soft_delete_photo(&mut self, id: i64) -> StoreResult<()> {
        self.live_photo(id)?;
        if let Some(p) = self.photos.get_mut(&id) {
            p.deleted_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }
}

/// In-process store with the same visible semantics as [`super::PgStore`].
///
/// A unit of work holds the table lock for its whole lifetime and writes to
/// a staged copy that replaces the tables on commit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.tables.lock().await.insert_user(user)
    }

    async fn find_user(&self, id: i64) -> StoreResult<User> {
        self.tables.lock().await.live_user(id).cloned()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.tables
            .lock()
            .await
            .users
            .values()
            .find(|u| u.deleted_at.is_none() && u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_photo(&self, photo: NewPhoto) -> StoreResult<Photo> {
        self.tables.lock().await.insert_photo(photo)
    }

    async fn find_photo(&self, id: i64) -> StoreResult<Photo> {
        self.tables.lock().await.live_photo(id).cloned()
    }

    async fn find_photos(&self, owner: Option<i64>) -> StoreResult<Vec<Photo>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .photos
            .values()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| owner.map_or(true, |o| p.user_id == o))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_user(&mut self, id: i64) -> StoreResult<User> {
        self.staged.live_user(id).cloned()
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<User> {
        self.staged.update_user(user)
    }

    async fn delete_user(&mut self, id: i64) -> StoreResult<()> {
        self.staged.soft_delete_user(id)
    }

    async fn lock_photo(&mut self, id: i64) -> StoreResult<Photo> {
        self.staged.live_photo(id).cloned()
    }

    async fn save_photo(&mut self, photo: &Photo) -> StoreResult<Photo> {
        self.staged.update_photo(photo)
    }

    async fn delete_photo(&mut self, id: i64) -> StoreResult<()> {
        self.staged.soft_delete_photo(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
