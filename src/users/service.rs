use crate::auth::{Authority, Hasher, TokenKind, AUTHORITIES_OBJECT, MEMBER_RELATION};
use crate::errors::{Error, Result};
use crate::notify::Notifier;
use crate::users::{
    Credentials, NewUser, PageMetadata, Status, User, UserPage, UserRepository, UserUpdate,
};
use regex::Regex;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Orchestrates the account collaborators: registration, authentication,
/// profile access, administrative listing, password lifecycle and status
/// transitions.
///
/// Every operation resolves the caller's token first, then enforces the
/// authorization rule for that operation, then touches the repository. No
/// lock is held across collaborator calls; the repository alone guards
/// shared state.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn UserRepository>,
    hasher: Arc<dyn Hasher>,
    authority: Arc<dyn Authority>,
    notifier: Arc<dyn Notifier>,
    password_policy: Regex,
}

impl AccountService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        hasher: Arc<dyn Hasher>,
        authority: Arc<dyn Authority>,
        notifier: Arc<dyn Notifier>,
        password_policy: Regex,
    ) -> Self {
        Self {
            repo,
            hasher,
            authority,
            notifier,
            password_policy,
        }
    }

    fn check_password_policy(&self, password: &str) -> Result<()> {
        if !self.password_policy.is_match(password) {
            warn!("password rejected by strength policy");
            return Err(Error::PasswordFormat);
        }
        Ok(())
    }

    async fn require_admin(&self, subject: &str) -> Result<()> {
        if !self
            .authority
            .authorize(subject, AUTHORITIES_OBJECT, MEMBER_RELATION)
            .await?
        {
            warn!(subject = %subject, "caller lacks the authorities relation");
            return Err(Error::Authorization);
        }
        Ok(())
    }

    /// Create a new account on behalf of an administrative caller.
    ///
    /// The password policy is checked before anything else, so a weak
    /// password fails the same way regardless of who asks. The caller must
    /// hold the `authorities` membership; who already counts as authorized is
    /// entirely the authority's decision.
    #[instrument(skip(self, caller_token, new_user), fields(email = %new_user.email))]
    pub async fn register(&self, caller_token: &str, new_user: NewUser) -> Result<Uuid> {
        self.check_password_policy(&new_user.password)?;

        let caller = self.authority.identify(caller_token).await?;
        self.require_admin(&caller.email).await?;

        let email = new_user.email.trim().to_lowercase();
        let password_hash = self.hasher.hash(&new_user.password)?;
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            metadata: new_user.metadata,
            status: new_user.status,
            created_at: OffsetDateTime::now_utc(),
        };

        let id = self.repo.save(user).await?;
        info!(user_id = %id, email = %email, "user registered");
        Ok(id)
    }

    /// Authenticate credentials and mint an access token.
    ///
    /// A disabled account is indistinguishable from a missing one here: both
    /// are `NotFound`, so an unauthenticated caller learns nothing about
    /// which accounts exist.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<String> {
        let email = credentials.email.trim().to_lowercase();
        let user = self.repo.retrieve_by_email(&email).await?;
        if user.status == Status::Disabled {
            warn!(email = %email, "login attempt against disabled account");
            return Err(Error::NotFound);
        }

        if !self
            .hasher
            .verify(&credentials.password, &user.password_hash)?
        {
            warn!(email = %email, "login with invalid password");
            return Err(Error::Authentication);
        }

        let token = self
            .authority
            .issue(Some(user.id), &user.email, TokenKind::Access)
            .await?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(token)
    }

    /// Return the caller's own account, with the password hash blanked.
    #[instrument(skip(self, token))]
    pub async fn view_profile(&self, token: &str) -> Result<User> {
        let identity = self.authority.identify(token).await?;
        let user = self.repo.retrieve_by_email(&identity.email).await?;
        Ok(user.redacted())
    }

    /// Return any account by id, for an authenticated caller.
    #[instrument(skip(self, token))]
    pub async fn view_user(&self, token: &str, user_id: Uuid) -> Result<User> {
        self.authority.identify(token).await?;
        let user = self.repo.retrieve_by_id(user_id).await?;
        Ok(user.redacted())
    }

    /// Administrative listing with status/email/metadata filters and
    /// offset/limit windowing.
    #[instrument(skip(self, token, page))]
    pub async fn list_users(&self, token: &str, page: PageMetadata) -> Result<UserPage> {
        let caller = self.authority.identify(token).await?;
        self.require_admin(&caller.email).await?;

        let mut result = self.repo.retrieve_all(&page).await?;
        result.users = result.users.into_iter().map(User::redacted).collect();
        Ok(result)
    }

    /// Replace the caller's metadata. The email is the login identifier and
    /// stays immutable.
    #[instrument(skip(self, token, update))]
    pub async fn update_user(&self, token: &str, update: UserUpdate) -> Result<()> {
        let identity = self.authority.identify(token).await?;
        self.repo
            .update_user(&identity.email, update.metadata)
            .await?;
        info!(email = %identity.email, "user metadata updated");
        Ok(())
    }

    /// Rotate the caller's password after re-verifying the old one.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        token: &str,
        new_password: &str,
        old_password: &str,
    ) -> Result<()> {
        let identity = self.authority.identify(token).await?;
        let user = self.repo.retrieve_by_email(&identity.email).await?;

        if !self.hasher.verify(old_password, &user.password_hash)? {
            warn!(email = %identity.email, "change password with wrong old password");
            return Err(Error::Authentication);
        }
        self.check_password_policy(new_password)?;

        let password_hash = self.hasher.hash(new_password)?;
        self.repo
            .update_password(&user.email, &password_hash)
            .await?;
        info!(user_id = %user.id, email = %user.email, "password changed");
        Ok(())
    }

    /// Anonymous "forgot password" entry point: issue a reset token for the
    /// account behind `email` and deliver a reset link built from `host`.
    /// A notifier failure is surfaced but the issued token stays valid.
    #[instrument(skip(self, host))]
    pub async fn generate_reset_token(&self, email: &str, host: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        let user = self.repo.retrieve_by_email(&email).await?;

        let reset_token = self
            .authority
            .issue(Some(user.id), &user.email, TokenKind::Reset)
            .await?;
        info!(user_id = %user.id, email = %user.email, "reset token issued");

        self.notifier
            .send_password_reset(&user.email, host, &reset_token)
            .await
    }

    /// Authenticated variant of the reset flow: the caller proves a session
    /// with `token` and asks for a reset link to be mailed to `email`.
    #[instrument(skip(self, host, token))]
    pub async fn send_password_reset(&self, host: &str, email: &str, token: &str) -> Result<()> {
        self.authority.identify(token).await?;
        self.notifier.send_password_reset(email, host, token).await
    }

    /// Consume a reset token and set a new password. The token itself is the
    /// proof of authorization; no old password is required.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> Result<()> {
        let identity = self.authority.identify(reset_token).await?;
        let user = self.repo.retrieve_by_email(&identity.email).await?;

        self.check_password_policy(new_password)?;
        let password_hash = self.hasher.hash(new_password)?;
        self.repo
            .update_password(&user.email, &password_hash)
            .await?;
        info!(user_id = %user.id, email = %user.email, "password reset");
        Ok(())
    }

    /// Transition an account to `Disabled`. Disabling twice is an error; the
    /// repository applies the guard atomically.
    #[instrument(skip(self, token))]
    pub async fn disable_user(&self, token: &str, user_id: Uuid) -> Result<()> {
        self.authority.identify(token).await?;
        self.repo.change_status(user_id, Status::Disabled).await?;
        info!(user_id = %user_id, "user disabled");
        Ok(())
    }
}
