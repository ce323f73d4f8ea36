use crate::errors::{Error, Result};
use crate::users::{Metadata, PageMetadata, Status, User, UserPage};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Durable store of accounts: keyed by id, unique by email, queryable with
/// filters and pagination. Implementations must enforce email uniqueness
/// atomically (a concurrent `save` race on one email yields exactly one
/// `Conflict`) and apply per-account mutations atomically relative to
/// concurrent reads.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new account, failing with [`Error::Conflict`] if the email
    /// is already taken.
    async fn save(&self, user: User) -> Result<Uuid>;

    async fn retrieve_by_id(&self, id: Uuid) -> Result<User>;

    async fn retrieve_by_email(&self, email: &str) -> Result<User>;

    /// Filtered, windowed listing in stable creation order. A supplied email
    /// filter that matches no account is [`Error::NotFound`], not an empty
    /// page.
    async fn retrieve_all(&self, page: &PageMetadata) -> Result<UserPage>;

    /// Replace the stored metadata for `email`.
    async fn update_user(&self, email: &str, metadata: Metadata) -> Result<()>;

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<()>;

    /// Transition the account's status. Disabling an already-disabled
    /// account is [`Error::AlreadyDisabled`].
    async fn change_status(&self, id: Uuid, status: Status) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    // Insertion order doubles as the stable listing order.
    users: Vec<User>,
    by_email: HashMap<String, usize>,
}

/// Reference [`UserRepository`] over a `tokio` read-write lock. All mutations
/// run under one write guard, so uniqueness checks and updates are atomic and
/// readers never observe a half-applied change.
#[derive(Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn metadata_matches(filter: &Metadata, metadata: &Metadata) -> bool {
    filter.iter().all(|(k, v)| metadata.get(k) == Some(v))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save(&self, user: User) -> Result<Uuid> {
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&user.email) {
            return Err(Error::Conflict);
        }
        let id = user.id;
        let idx = inner.users.len();
        inner.by_email.insert(user.email.clone(), idx);
        inner.users.push(user);
        Ok(id)
    }

    async fn retrieve_by_id(&self, id: Uuid) -> Result<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn retrieve_by_email(&self, email: &str) -> Result<User> {
        let inner = self.inner.read().await;
        inner
            .by_email
            .get(email)
            .map(|&idx| inner.users[idx].clone())
            .ok_or(Error::NotFound)
    }

    async fn retrieve_all(&self, page: &PageMetadata) -> Result<UserPage> {
        let inner = self.inner.read().await;

        let candidates: Vec<&User> = match &page.email {
            Some(email) => {
                let &idx = inner.by_email.get(email).ok_or(Error::NotFound)?;
                vec![&inner.users[idx]]
            }
            None => inner.users.iter().collect(),
        };

        let matches: Vec<&User> = candidates
            .into_iter()
            .filter(|u| page.status.matches(u.status))
            .filter(|u| {
                page.metadata
                    .as_ref()
                    .map(|f| metadata_matches(f, &u.metadata))
                    .unwrap_or(true)
            })
            .collect();

        let total = matches.len() as u64;
        let users = matches
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(UserPage {
            users,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    async fn update_user(&self, email: &str, metadata: Metadata) -> Result<()> {
        let mut inner = self.inner.write().await;
        let idx = *inner.by_email.get(email).ok_or(Error::NotFound)?;
        inner.users[idx].metadata = metadata;
        Ok(())
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let idx = *inner.by_email.get(email).ok_or(Error::NotFound)?;
        inner.users[idx].password_hash = password_hash.to_string();
        Ok(())
    }

    async fn change_status(&self, id: Uuid, status: Status) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(Error::NotFound)?;
        if user.status == status {
            return match status {
                Status::Disabled => Err(Error::AlreadyDisabled),
                Status::Enabled => Ok(()),
            };
        }
        user.status = status;
        Ok(())
    }
}
