use thiserror::Error;

/// Error taxonomy shared by the account service and its collaborators.
///
/// Every variant is terminal: the service surfaces it to the caller verbatim
/// and never retries on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller identity could not be established or credentials were wrong.
    #[error("failed to perform authentication over the entity")]
    Authentication,

    /// Identity established but lacks the required relation.
    #[error("failed to perform authorization over the entity")]
    Authorization,

    /// Referenced entity does not exist, or is intentionally hidden as if it
    /// did not.
    #[error("entity not found")]
    NotFound,

    /// Email uniqueness violation.
    #[error("entity already exists")]
    Conflict,

    /// New password does not satisfy the configured strength policy.
    #[error("password does not meet the format requirements")]
    PasswordFormat,

    /// Idempotency guard on the status transition.
    #[error("user already disabled")]
    AlreadyDisabled,

    /// Collaborator failure outside the named taxonomy (hashing backend,
    /// SMTP delivery, token encoding).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True when two errors are the same taxonomy kind. `Other` values only
    /// match other `Other` values; their payloads are not compared.
    pub fn is_kind(&self, other: &Error) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_by_discriminant() {
        assert!(Error::NotFound.is_kind(&Error::NotFound));
        assert!(!Error::NotFound.is_kind(&Error::Conflict));
        let a = Error::Other(anyhow::anyhow!("smtp down"));
        let b = Error::Other(anyhow::anyhow!("different"));
        assert!(a.is_kind(&b));
    }

    #[test]
    fn messages_do_not_leak_detail() {
        assert_eq!(Error::NotFound.to_string(), "entity not found");
        assert_eq!(
            Error::Authentication.to_string(),
            "failed to perform authentication over the entity"
        );
    }
}
