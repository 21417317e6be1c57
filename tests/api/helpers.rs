use secrecy::Secret;
use sqlx::{migrate, Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;
use wiremock::MockServer;

use mailsling::{
    config::{get_configuration, DatabaseSettings, Settings},
    journal::Journal,
    mailchimp_client::MailChimpClient,
    mailer::Mailer,
    message_source::InMemoryMessageSource,
    notifier::Notifier,
    repository::PgRepository,
    startup::get_connection_db_pool,
};

pub struct TestApp {
    pub config: Settings,
    pub db_pool: PgPool,
    pub mailchimp_server: MockServer,
    pub source: InMemoryMessageSource,
    pub mailer: Mailer<InMemoryMessageSource, PgRepository, MailChimpClient>,
}

impl TestApp {
    /// Mailer over a throwaway Postgres database, an in-memory queue and a mocked Mailchimp.
    pub async fn spawn_app() -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let db_test_name = format!("db_{}", Uuid::new_v4().to_string().replace('-', "_"));
        let mailchimp_server = MockServer::start().await;

        config.set_mailchimp_base_url(mailchimp_server.uri());

        let db_pool = configure_db(&mut config.database, db_test_name).await;

        let client = MailChimpClient::new(
            config.mailchimp.base_url.clone(),
            Secret::new("test-key-us1".to_string()),
            Some(config.mailchimp.get_timeout()),
        )
        .expect("Failed to build Mailchimp client.");
        let source = InMemoryMessageSource::new();
        let mailer = Mailer::new(
            source.clone(),
            Journal::new(PgRepository::new(db_pool.clone())),
            Notifier::new(client),
            config.get_default_list_id(),
        );

        TestApp {
            config,
            db_pool,
            mailchimp_server,
            source,
            mailer,
        }
    }

    pub fn journal(&self) -> &Journal<PgRepository> {
        self.mailer.journal()
    }

    pub async fn membership_status(&self, email: &str, list_id: &str) -> Option<String> {
        sqlx::query_scalar(
            r#"
            SELECT lr.status
            FROM list_recipients lr
            JOIN recipients r ON r.id = lr.recipient_id
            WHERE r.email = $1 AND lr.list_id = $2
            "#,
        )
        .bind(email)
        .bind(list_id)
        .fetch_optional(&self.db_pool)
        .await
        .expect("Failed to fetch membership status.")
    }
}

async fn configure_db(db_config: &mut DatabaseSettings, db_test_name: String) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect_with(&db_config.get_db_options())
        .await
        .expect("Failed to connect to Postgres.");

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, db_test_name))
        .await
        .expect("Failed to create database.");

    connection
        .close()
        .await
        .expect("Failed to close connection.");

    // Execute migrations
    db_config.set_name(db_test_name.clone());

    let db_pool = get_connection_db_pool(db_config);

    migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run migrations.");

    db_pool
}
