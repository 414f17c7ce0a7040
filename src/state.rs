use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::auth::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};
use crate::config::AppConfig;
use crate::content::{ContentStore, MemoryContentStore, PgContentStore};
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub content: Arc<dyn ContentStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let (users, content) = match &config.database_url {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
                    .connect(url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;

                (
                    Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>,
                    Arc::new(PgContentStore::new(db)) as Arc<dyn ContentStore>,
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                let users = Arc::new(MemoryUserStore::new());
                (
                    users.clone() as Arc<dyn UserStore>,
                    Arc::new(MemoryContentStore::new(users)) as Arc<dyn ContentStore>,
                )
            }
        };

        let notifier = match &config.email.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, "smtp email delivery enabled");
                Arc::new(SmtpNotifier::new(
                    smtp,
                    config.email.clone(),
                    config.verification_ttl_hours,
                )?) as Arc<dyn Notifier>
            }
            None => {
                warn!("email service not configured; emails will be logged");
                Arc::new(LogNotifier::new(config.email.clone())) as Arc<dyn Notifier>
            }
        };

        Ok(Self::from_parts(config, users, content, notifier))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        content: Arc<dyn ContentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            users,
            content,
            notifier,
        }
    }

    pub fn notify_timeout(&self) -> Duration {
        self.config.email.timeout()
    }
}

#[cfg(test)]
pub struct Fake {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub content: Arc<MemoryContentStore>,
    pub notifier: Arc<crate::notify::testing::RecordingNotifier>,
}

#[cfg(test)]
impl AppState {
    pub fn fake() -> Fake {
        Self::fake_with(crate::notify::testing::RecordingNotifier::default())
    }

    pub fn fake_with(notifier: crate::notify::testing::RecordingNotifier) -> Fake {
        let users = Arc::new(MemoryUserStore::new());
        let content = Arc::new(MemoryContentStore::new(users.clone()));
        let notifier = Arc::new(notifier);
        let state = Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            users.clone(),
            content.clone(),
            notifier.clone(),
        );
        Fake {
            state,
            users,
            content,
            notifier,
        }
    }
}
