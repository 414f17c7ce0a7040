use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

/// SMTP credentials; only present when `EMAIL_SERVICE=smtp`.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub client_url: String,
    pub smtp: Option<SmtpConfig>,
    pub timeout_secs: u64,
}

impl EmailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn verification_url(&self, token: &str) -> String {
        format!("{}/verify-email/{}", self.client_url.trim_end_matches('/'), token)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-process store.
    pub database_url: Option<String>,
    pub db_acquire_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub verification_ttl_hours: i64,
    pub email: EmailConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "cookit".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "cookit-users".into()),
            ttl_days: env_or("JWT_TTL_DAYS", 30),
        };

        let smtp = match std::env::var("EMAIL_SERVICE").ok().as_deref() {
            Some("smtp") | Some("gmail") => {
                let user = std::env::var("EMAIL_USER")?;
                Some(SmtpConfig {
                    host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
                    from: std::env::var("EMAIL_FROM")
                        .unwrap_or_else(|_| format!("COOKit <{}>", user)),
                    password: std::env::var("EMAIL_PASSWORD")?,
                    user,
                })
            }
            _ => None,
        };

        let email = EmailConfig {
            client_url: std::env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            smtp,
            timeout_secs: env_or("NOTIFY_TIMEOUT_SECS", 10),
        };

        Ok(Self {
            database_url,
            db_acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", 5),
            jwt,
            verification_ttl_hours: env_or("VERIFICATION_TTL_HOURS", 24),
            email,
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            db_acquire_timeout_secs: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_days: 30,
            },
            verification_ttl_hours: 24,
            email: EmailConfig {
                client_url: "http://localhost:3000/".into(),
                smtp: None,
                timeout_secs: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_url_joins_without_double_slash() {
        let cfg = AppConfig::for_tests();
        assert_eq!(
            cfg.email.verification_url("abc"),
            "http://localhost:3000/verify-email/abc"
        );
    }
}
