use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Object the administrative relation is checked against.
pub const AUTHORITIES_OBJECT: &str = "authorities";
/// Relation a subject must hold on [`AUTHORITIES_OBJECT`] to create accounts
/// or list them.
pub const MEMBER_RELATION: &str = "member";

/// Token type used to distinguish login tokens from password-reset tokens.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Reset,
}

/// The identity a token resolves to. `id` is absent for bootstrap
/// administrators identified by configuration rather than by a minted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Option<Uuid>,
    pub email: String,
}

/// Delegated token issuance, resolution and relationship-based authorization.
///
/// The account service never inspects token contents itself; every operation
/// that needs the identity behind a token goes through `identify`. Expiry and
/// one-time-use semantics for reset tokens are this collaborator's concern.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Mint an opaque token bound to `(user_id, email, kind)`.
    async fn issue(&self, user_id: Option<Uuid>, email: &str, kind: TokenKind) -> Result<String>;

    /// Resolve a token back to the identity it was bound to. Fails with
    /// [`crate::Error::Authentication`] for empty, malformed or expired
    /// tokens.
    async fn identify(&self, token: &str) -> Result<Identity>;

    /// Relationship check: does `subject` hold `relation` on `object`?
    async fn authorize(&self, subject: &str, object: &str, relation: &str) -> Result<bool>;
}
