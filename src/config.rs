use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    /// Strength policy applied to every new password.
    pub password_regex: String,
    /// Bootstrap administrators: subjects granted the `authorities` relation
    /// at startup, and the only callers `identify` resolves without a minted
    /// token. This is the explicit path that lets the first account
    /// self-register on an empty deployment.
    pub admin_emails: Vec<String>,
    /// Absent when no mail relay is configured; reset notifications then need
    /// a caller-supplied notifier.
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userhub-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            reset_ttl_minutes: std::env::var("JWT_RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };

        let password_regex =
            std::env::var("PASSWORD_REGEX").unwrap_or_else(|_| r"^.{8,}$".into());

        let admin_emails = std::env::var("ADMIN_EMAILS")
            .map(|v| {
                v.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "no-reply@userhub.local".into()),
            }),
            Err(_) => None,
        };

        Ok(Self {
            jwt,
            password_regex,
            admin_emails,
            smtp,
        })
    }
}
