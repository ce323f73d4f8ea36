use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

pub mod repository;
pub mod service;

pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::AccountService;

/// Open, schemaless key-value attributes attached to an account by callers.
/// Keys round-trip verbatim; no structure is enforced.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Account lifecycle flag. `Enabled -> Disabled` is the only modeled
/// transition; re-enabling is an external administrative concern.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Enabled,
    Disabled,
}

/// Status selector for administrative listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Enabled,
    Disabled,
    #[default]
    All,
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Enabled => status == Status::Enabled,
            StatusFilter::Disabled => status == Status::Disabled,
        }
    }
}

/// A stored account. The plaintext password is hashed before it ever reaches
/// this type and the hash is never serialized outward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Copy with the password hash blanked, for returning to callers.
    pub(crate) fn redacted(mut self) -> Self {
        self.password_hash.clear();
        self
    }
}

/// Registration input: everything the caller supplies for a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub status: Status,
}

/// Login input.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Mutable account fields. `email` is deliberately absent: it is the login
/// identifier and immutable after creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub metadata: Metadata,
}

/// Listing query descriptor. Input value object only, never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMetadata {
    pub offset: u64,
    pub limit: u64,
    /// Exact-match email filter. A non-matching filter is a lookup failure
    /// (`NotFound`), not an empty page.
    pub email: Option<String>,
    /// Subset filter: every key/value pair must be present in the account's
    /// metadata.
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub status: StatusFilter,
}

/// One window of an administrative listing, with the pre-window total.
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            metadata: Metadata::new(),
            status: Status::Enabled,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("test@example.com"));
        assert!(json.contains("enabled"));
    }

    #[test]
    fn metadata_round_trips_arbitrary_keys() {
        let raw = r#"{"email":"m@example.com","password":"12345678",
                      "metadata":{"role":"user","shape":{"sides":7},"tags":[1,2]}}"#;
        let new_user: NewUser = serde_json::from_str(raw).unwrap();
        assert_eq!(new_user.metadata["role"], serde_json::json!("user"));
        assert_eq!(new_user.metadata["shape"]["sides"], serde_json::json!(7));
        assert_eq!(new_user.status, Status::Enabled);
    }

    #[test]
    fn status_filter_defaults_to_all() {
        let pm: PageMetadata = serde_json::from_str(r#"{"offset":0,"limit":10}"#).unwrap();
        assert_eq!(pm.status, StatusFilter::All);
        assert!(pm.status.matches(Status::Enabled));
        assert!(pm.status.matches(Status::Disabled));
        assert!(!StatusFilter::Enabled.matches(Status::Disabled));
    }
}
