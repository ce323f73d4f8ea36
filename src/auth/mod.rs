pub mod authority;
pub mod jwt;
pub mod password;

pub use authority::{Authority, Identity, TokenKind, AUTHORITIES_OBJECT, MEMBER_RELATION};
pub use jwt::JwtAuthority;
pub use password::{Argon2Hasher, Hasher};
