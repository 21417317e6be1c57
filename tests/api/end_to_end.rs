use secrecy::Secret;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::TestApp;
use mailsling::domain::RecipientStatus;
use mailsling::journal::Journal;
use mailsling::mailchimp_client::MailChimpClient;
use mailsling::mailer::{Mailer, PollReport, ProcessReport};
use mailsling::message_source::InMemoryMessageSource;
use mailsling::notifier::Notifier;
use mailsling::repository::InMemoryRepository;

struct InMemoryApp {
    mailchimp_server: MockServer,
    source: InMemoryMessageSource,
    repository: InMemoryRepository,
    mailer: Mailer<InMemoryMessageSource, InMemoryRepository, MailChimpClient>,
}

async fn spawn_in_memory_app() -> InMemoryApp {
    let mailchimp_server = MockServer::start().await;
    let client = MailChimpClient::new(
        Some(mailchimp_server.uri()),
        Secret::new("test-key-us1".to_string()),
        None,
    )
    .expect("Failed to build Mailchimp client.");
    let source = InMemoryMessageSource::new();
    let repository = InMemoryRepository::new();
    let mailer = Mailer::new(
        source.clone(),
        Journal::new(repository.clone()),
        Notifier::new(client),
        "main".to_string(),
    );

    InMemoryApp {
        mailchimp_server,
        source,
        repository,
        mailer,
    }
}

#[tokio::test]
async fn subscribe_message_ends_up_subscribed_on_the_default_list() {
    let app = spawn_in_memory_app().await;
    app.source
        .push(r#"{"type":"subscribe","email":"a@b.com"}"#)
        .await;

    Mock::given(method("PUT"))
        .and(path("/lists/main/members/a@b.com"))
        .and(body_json(serde_json::json!({
            "email_address": "a@b.com",
            "status_if_new": "subscribed",
            "status": "subscribed",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    let poll = app.mailer.poll().await.unwrap();

    assert_eq!(
        poll,
        PollReport {
            received: 1,
            journaled: 1,
            skipped: 0,
            unacknowledged: 0
        }
    );
    let recipients = app.repository.recipients().await;
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].email.as_ref(), "a@b.com");
    assert_eq!(
        app.repository
            .list_recipient("a@b.com", "main")
            .await
            .unwrap()
            .status,
        RecipientStatus::New
    );

    let process = app.mailer.process().await.unwrap();

    assert_eq!(
        process,
        ProcessReport {
            subscribed: 1,
            unsubscribed: 0,
            failed: 0
        }
    );
    assert_eq!(
        app.repository
            .list_recipient("a@b.com", "main")
            .await
            .unwrap()
            .status,
        RecipientStatus::Subscribed
    );
}

#[tokio::test]
async fn provider_rejection_is_recorded_as_failed() {
    let app = spawn_in_memory_app().await;
    app.source
        .push(r#"{"type":"unsubscribe","email":"a@b.com","listIds":["news"]}"#)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Member In Compliance State"))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    app.mailer.run(true, true).await.unwrap();

    assert_eq!(
        app.repository
            .list_recipient("a@b.com", "news")
            .await
            .unwrap()
            .status,
        RecipientStatus::Failed
    );
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn subscribe_then_unsubscribe_against_postgres() {
    let app = TestApp::spawn_app().await;
    let default_list = app.config.get_default_list_id();
    app.source
        .push(r#"{"type":"sign_up","email":"a@b.com","attributes":{"FNAME":"Ada"}}"#)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/lists/{}/members/a@b.com", default_list)))
        .and(body_json(serde_json::json!({
            "email_address": "a@b.com",
            "status_if_new": "subscribed",
            "status": "subscribed",
            "merge_fields": {"FNAME": "Ada"},
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    app.mailer.run(true, true).await.unwrap();

    assert_eq!(
        app.membership_status("a@b.com", &default_list).await.as_deref(),
        Some("subscribed")
    );

    app.source
        .push(r#"{"type":"unsubscribe","email":"a@b.com"}"#)
        .await;

    Mock::given(method("PUT"))
        .and(body_json(serde_json::json!({
            "email_address": "a@b.com",
            "status_if_new": "unsubscribed",
            "status": "unsubscribed",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.mailchimp_server)
        .await;

    app.mailer.run(true, true).await.unwrap();

    assert_eq!(
        app.membership_status("a@b.com", &default_list).await.as_deref(),
        Some("unsubscribed")
    );
    assert_eq!(app.source.acknowledged().await.len(), 2);
}
