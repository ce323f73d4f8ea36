use crate::auth::authority::{Authority, Identity, TokenKind, AUTHORITIES_OBJECT, MEMBER_RELATION};
use crate::config::{AppConfig, JwtConfig};
use crate::errors::{Error, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

/// JWT payload a token is bound to at issuance.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct Claims {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    sub: Option<Uuid>,
    email: String,
    iat: usize,
    exp: usize,
    iss: String,
    aud: String,
    kind: TokenKind,
}

/// [`Authority`] backed by HS256 JWTs plus an in-memory relation table.
///
/// The relation table stands in for the external policy engine: subjects are
/// granted `(object, relation)` pairs at construction and `authorize` only
/// consults that table. Bootstrap administrators (from `ADMIN_EMAILS`) get
/// the `authorities` membership and may present their bare email in place of
/// a token; `identify` resolves it explicitly so the first account of a
/// deployment can self-register before any token exists.
pub struct JwtAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    reset_ttl: Duration,
    policy: HashMap<String, HashSet<(String, String)>>,
    bootstrap: HashSet<String>,
}

impl JwtAuthority {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes as u64) * 60),
            reset_ttl: Duration::from_secs((cfg.reset_ttl_minutes as u64) * 60),
            policy: HashMap::new(),
            bootstrap: HashSet::new(),
        }
    }

    /// Build from the full application config, granting every configured
    /// administrator the `authorities` membership and the bootstrap
    /// identify-by-email path.
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut authority = Self::new(&cfg.jwt);
        for email in &cfg.admin_emails {
            authority.grant(email, AUTHORITIES_OBJECT, MEMBER_RELATION);
            authority.bootstrap.insert(email.clone());
        }
        authority
    }

    /// Grant `subject` the `relation` on `object`.
    pub fn grant(&mut self, subject: &str, object: &str, relation: &str) {
        self.policy
            .entry(subject.to_string())
            .or_default()
            .insert((object.to_string(), relation.to_string()));
    }

    fn sign(&self, user_id: Option<Uuid>, email: &str, kind: TokenKind) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Reset => self.reset_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow::anyhow!("jwt encode failed: {e}"))?;
        debug!(email = %email, kind = ?kind, "jwt signed");
        Ok(token)
    }
}

#[async_trait]
impl Authority for JwtAuthority {
    async fn issue(&self, user_id: Option<Uuid>, email: &str, kind: TokenKind) -> Result<String> {
        self.sign(user_id, email, kind)
    }

    async fn identify(&self, token: &str) -> Result<Identity> {
        if token.is_empty() {
            return Err(Error::Authentication);
        }
        if self.bootstrap.contains(token) {
            debug!(email = %token, "bootstrap administrator identified by email");
            return Ok(Identity {
                id: None,
                email: token.to_string(),
            });
        }
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            Error::Authentication
        })?;
        debug!(email = %data.claims.email, kind = ?data.claims.kind, "jwt verified");
        Ok(Identity {
            id: data.claims.sub,
            email: data.claims.email,
        })
    }

    async fn authorize(&self, subject: &str, object: &str, relation: &str) -> Result<bool> {
        let granted = self
            .policy
            .get(subject)
            .map(|set| set.contains(&(object.to_string(), relation.to_string())))
            .unwrap_or(false);
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
            reset_ttl_minutes: 1,
        }
    }

    #[tokio::test]
    async fn issue_and_identify_access_token() {
        let authority = JwtAuthority::new(&test_config());
        let user_id = Uuid::new_v4();
        let token = authority
            .issue(Some(user_id), "alice@example.com", TokenKind::Access)
            .await
            .expect("issue access");
        let identity = authority.identify(&token).await.expect("identify");
        assert_eq!(identity.id, Some(user_id));
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn reset_token_resolves_to_same_identity() {
        let authority = JwtAuthority::new(&test_config());
        let token = authority
            .issue(None, "alice@example.com", TokenKind::Reset)
            .await
            .expect("issue reset");
        let identity = authority.identify(&token).await.expect("identify");
        assert_eq!(identity.id, None);
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn identify_rejects_empty_and_garbage_tokens() {
        let authority = JwtAuthority::new(&test_config());
        assert!(matches!(
            authority.identify("").await,
            Err(Error::Authentication)
        ));
        assert!(matches!(
            authority.identify("not-a-jwt").await,
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn identify_rejects_token_signed_with_other_secret() {
        let authority = JwtAuthority::new(&test_config());
        let mut other_cfg = test_config();
        other_cfg.secret = "other-secret".into();
        let other = JwtAuthority::new(&other_cfg);
        let token = other
            .issue(None, "alice@example.com", TokenKind::Access)
            .await
            .expect("issue");
        assert!(matches!(
            authority.identify(&token).await,
            Err(Error::Authentication)
        ));
    }

    #[tokio::test]
    async fn bootstrap_admin_identifies_by_bare_email() {
        let cfg = AppConfig {
            jwt: test_config(),
            password_regex: r"^.{8,}$".into(),
            admin_emails: vec!["root@example.com".into()],
            smtp: None,
        };
        let authority = JwtAuthority::from_config(&cfg);

        let identity = authority
            .identify("root@example.com")
            .await
            .expect("bootstrap identify");
        assert_eq!(identity.id, None);
        assert_eq!(identity.email, "root@example.com");

        assert!(authority
            .authorize("root@example.com", AUTHORITIES_OBJECT, MEMBER_RELATION)
            .await
            .expect("authorize"));
        assert!(!authority
            .authorize("stranger@example.com", AUTHORITIES_OBJECT, MEMBER_RELATION)
            .await
            .expect("authorize"));
    }

    #[tokio::test]
    async fn non_admin_email_does_not_identify() {
        let authority = JwtAuthority::new(&test_config());
        assert!(matches!(
            authority.identify("alice@example.com").await,
            Err(Error::Authentication)
        ));
    }
}
