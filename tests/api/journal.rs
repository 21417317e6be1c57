use fake::faker::internet::en::SafeEmail;
use fake::Fake;

use crate::helpers::TestApp;
use mailsling::domain::{Attributes, PendingStatus, RecipientEmail, RecipientStatus};

fn email() -> RecipientEmail {
    RecipientEmail::parse(SafeEmail().fake()).unwrap()
}

fn lists(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn pending_state_is_persisted_with_attributes() {
    let app = TestApp::spawn_app().await;
    let recipient = email();
    let attributes = Attributes::from([("FNAME".to_string(), "Ada".to_string())]);

    app.journal()
        .set_recipient_pending_state(&recipient, &lists(&["a", "b"]), PendingStatus::New, &attributes)
        .await
        .expect("Failed to journal intent.");

    let pending = app.journal().get_recipient_pending_state().await.unwrap();

    assert_eq!(pending.len(), 2);
    assert!(pending[0].id < pending[1].id);
    for list_recipient in pending {
        assert_eq!(list_recipient.email, recipient);
        assert_eq!(list_recipient.status, RecipientStatus::New);
        assert_eq!(list_recipient.attributes, attributes);
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn repeated_intent_overwrites_status_and_attributes() {
    let app = TestApp::spawn_app().await;
    let recipient = email();

    app.journal()
        .set_recipient_pending_state(
            &recipient,
            &lists(&["a"]),
            PendingStatus::New,
            &Attributes::from([("FNAME".to_string(), "Ada".to_string())]),
        )
        .await
        .unwrap();
    let first = app.journal().get_recipient_pending_state().await.unwrap();
    app.journal()
        .set_recipient_pending_state(
            &recipient,
            &lists(&["a"]),
            PendingStatus::Unsubscribing,
            &Attributes::new(),
        )
        .await
        .unwrap();

    let second = app.journal().get_recipient_pending_state().await.unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].status, RecipientStatus::Unsubscribing);
    assert!(second[0].attributes.is_empty());
}

#[tokio::test]
#[ignore = "requires a running Postgres instance"]
async fn status_update_settles_the_membership() {
    let app = TestApp::spawn_app().await;
    let recipient = email();
    app.journal()
        .set_recipient_pending_state(&recipient, &lists(&["a"]), PendingStatus::New, &Attributes::new())
        .await
        .unwrap();
    let pending = app.journal().get_recipient_pending_state().await.unwrap();

    app.journal()
        .update_list_recipient(pending[0].id, RecipientStatus::Failed)
        .await
        .unwrap();

    assert!(app.journal().get_recipient_pending_state().await.unwrap().is_empty());
    assert_eq!(
        app.membership_status(recipient.as_ref(), "a").await.as_deref(),
        Some("failed")
    );

    app.journal()
        .set_recipient_pending_state(&recipient, &lists(&["a"]), PendingStatus::New, &Attributes::new())
        .await
        .unwrap();

    assert_eq!(
        app.membership_status(recipient.as_ref(), "a").await.as_deref(),
        Some("new")
    );
}
