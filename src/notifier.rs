use crate::domain::{PendingListRecipient, PendingStatus, RecipientStatus};
use crate::mailchimp_client::{ClientError, ListClient};

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("list recipient is {0}, which is not awaiting reconciliation")]
    NotPending(RecipientStatus),
}

/// Pushes one pending membership to the provider.
pub struct Notifier<C> {
    client: C,
}

impl<C: ListClient> Notifier<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Performs the provider action for the membership's pending status and returns the status
    /// it reaches on success.
    #[tracing::instrument(
        name = "Notify provider of recipient state",
        skip(self, list_recipient),
        fields(
            list_recipient_id = %list_recipient.id,
            list_id = %list_recipient.list_id,
            status = %list_recipient.status
        )
    )]
    pub async fn notify(
        &self,
        list_recipient: &PendingListRecipient,
    ) -> Result<RecipientStatus, NotifyError> {
        let email = &list_recipient.email;
        let list_id = list_recipient.list_id.as_str();

        match PendingStatus::try_from(list_recipient.status) {
            Ok(PendingStatus::New) => {
                self.client
                    .subscribe(email, list_id, &list_recipient.attributes)
                    .await?;
                Ok(RecipientStatus::Subscribed)
            }
            Ok(PendingStatus::Unsubscribing) => {
                self.client.unsubscribe(email, list_id).await?;
                Ok(RecipientStatus::Unsubscribed)
            }
            Err(status) => Err(NotifyError::NotPending(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NotifyError, Notifier};
    use crate::domain::{
        Attributes, ListRecipientId, PendingListRecipient, RecipientEmail, RecipientStatus,
    };
    use crate::mailchimp_client::{ClientError, ListClient};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<String>>,
        reject: bool,
    }

    #[async_trait]
    impl ListClient for RecordingClient {
        async fn subscribe(
            &self,
            email: &RecipientEmail,
            list_id: &str,
            attributes: &Attributes,
        ) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(format!(
                "subscribe {} {} {:?}",
                email, list_id, attributes
            ));
            if self.reject {
                return Err(ClientError::InvalidApiKey);
            }
            Ok(())
        }

        async fn unsubscribe(
            &self,
            email: &RecipientEmail,
            list_id: &str,
        ) -> Result<(), ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("unsubscribe {} {}", email, list_id));
            if self.reject {
                return Err(ClientError::InvalidApiKey);
            }
            Ok(())
        }
    }

    fn pending(status: RecipientStatus) -> PendingListRecipient {
        PendingListRecipient {
            id: ListRecipientId(1),
            email: RecipientEmail::parse("a@b.com".to_string()).unwrap(),
            list_id: "main".to_string(),
            status,
            attributes: Attributes::from([("FNAME".to_string(), "Ada".to_string())]),
        }
    }

    #[tokio::test]
    async fn new_membership_is_subscribed_with_its_attributes() {
        let notifier = Notifier::new(RecordingClient::default());

        let result = notifier.notify(&pending(RecipientStatus::New)).await;

        assert_eq!(result.unwrap(), RecipientStatus::Subscribed);
        assert_eq!(
            *notifier.client().calls.lock().unwrap(),
            vec![r#"subscribe a@b.com main {"FNAME": "Ada"}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn unsubscribing_membership_is_unsubscribed() {
        let notifier = Notifier::new(RecordingClient::default());

        let result = notifier.notify(&pending(RecipientStatus::Unsubscribing)).await;

        assert_eq!(result.unwrap(), RecipientStatus::Unsubscribed);
        assert_eq!(
            *notifier.client().calls.lock().unwrap(),
            vec!["unsubscribe a@b.com main".to_string()]
        );
    }

    #[tokio::test]
    async fn provider_rejection_is_an_error() {
        let notifier = Notifier::new(RecordingClient {
            reject: true,
            ..Default::default()
        });

        let result = notifier.notify(&pending(RecipientStatus::New)).await;

        assert!(matches!(result, Err(NotifyError::Client(_))));
    }

    #[tokio::test]
    async fn settled_membership_never_reaches_the_provider() {
        let notifier = Notifier::new(RecordingClient::default());

        for status in [
            RecipientStatus::Subscribed,
            RecipientStatus::Failed,
            RecipientStatus::Unsubscribed,
        ] {
            let result = notifier.notify(&pending(status)).await;

            assert!(matches!(result, Err(NotifyError::NotPending(s)) if s == status));
        }
        assert!(notifier.client().calls.lock().unwrap().is_empty());
    }
}
