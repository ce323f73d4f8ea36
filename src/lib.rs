//! Account and identity service core.
//!
//! Registers user accounts, authenticates credentials, issues and resolves
//! short-lived tokens through a delegated authority, manages the password
//! lifecycle (change, forgot/reset via emailed token) and administers account
//! status with privileged listing.
//!
//! The transport driving these operations (HTTP handlers, CLI) lives outside
//! this crate; everything here is exposed as the [`users::AccountService`]
//! operations plus the collaborator traits it is constructed from.

pub mod auth;
pub mod config;
pub mod errors;
pub mod notify;
pub mod users;

pub use auth::{Argon2Hasher, Authority, Hasher, Identity, JwtAuthority, TokenKind};
pub use config::AppConfig;
pub use errors::{Error, Result};
pub use notify::{Notifier, SmtpNotifier};
pub use users::{
    AccountService, Credentials, InMemoryUserRepository, Metadata, NewUser, PageMetadata, Status,
    StatusFilter, User, UserPage, UserRepository, UserUpdate,
};
