use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::config::{DatabaseSettings, Settings};
use crate::journal::Journal;
use crate::mailchimp_client::{ClientError, MailChimpClient};
use crate::mailer::{error_chain_fmt, Mailer, MailerError};
use crate::message_source::{MessageSourceError, RedisMessageSource};
use crate::notifier::Notifier;
use crate::repository::PgRepository;

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error("application.default_list_id must not be empty")]
    MissingDefaultList,
    #[error("Failed to run database migrations.")]
    Migrations(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to connect to the message queue.")]
    Queue(#[from] MessageSourceError),
    #[error("Failed to build the Mailchimp client.")]
    MailChimp(#[from] ClientError),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub type ProductionMailer = Mailer<RedisMessageSource, PgRepository, MailChimpClient>;

pub struct Application {
    mailer: ProductionMailer,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let default_list_id = config.get_default_list_id();
        if default_list_id.trim().is_empty() {
            return Err(StartupError::MissingDefaultList);
        }

        let repository = PgRepository::new(get_connection_db_pool(&config.database));
        repository.run_migrations().await?;

        let source = RedisMessageSource::connect(&config.queue).await?;
        source.requeue_in_flight().await?;

        let client = MailChimpClient::new(
            config.mailchimp.base_url.clone(),
            config.mailchimp.api_key.clone(),
            Some(config.mailchimp.get_timeout()),
        )?;

        let mailer = Mailer::new(
            source,
            Journal::new(repository),
            Notifier::new(client),
            default_list_id,
        );

        Ok(Self { mailer })
    }

    pub async fn run(&self, poll: bool, process: bool) -> Result<(), MailerError> {
        self.mailer.run(poll, process).await
    }
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
