use crate::domain::{ListRecipientId, RecipientIntent, RecipientStatus};
use crate::journal::{Journal, JournalError};
use crate::mailchimp_client::ListClient;
use crate::message_source::{MessageSource, MessageSourceError};
use crate::notifier::Notifier;
use crate::repository::Repository;

#[derive(thiserror::Error)]
pub enum MailerError {
    #[error("Failed to read the next message from the queue.")]
    Receive(#[source] MessageSourceError),
    #[error("Failed to read the pending list recipients.")]
    PendingState(#[source] JournalError),
    #[error("Failed to record the outcome for list recipient {id}.")]
    RecordOutcome {
        id: ListRecipientId,
        #[source]
        source: JournalError,
    },
}

impl std::fmt::Debug for MailerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub fn error_chain_fmt(
    err: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", err)?;
    let mut current = err.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t({})", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub journaled: usize,
    pub skipped: usize,
    pub unacknowledged: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub subscribed: usize,
    pub unsubscribed: usize,
    pub failed: usize,
}

/// Drives the two passes: journaling queued intents, then reconciling them with the provider.
pub struct Mailer<S, R, C> {
    source: S,
    journal: Journal<R>,
    notifier: Notifier<C>,
    default_list_id: String,
}

impl<S, R, C> Mailer<S, R, C>
where
    S: MessageSource,
    R: Repository,
    C: ListClient,
{
    pub fn new(source: S, journal: Journal<R>, notifier: Notifier<C>, default_list_id: String) -> Self {
        Self {
            source,
            journal,
            notifier,
            default_list_id,
        }
    }

    pub fn journal(&self) -> &Journal<R> {
        &self.journal
    }

    pub fn notifier(&self) -> &Notifier<C> {
        &self.notifier
    }

    /// Runs the selected passes, poll first. A failed poll does not prevent the process pass; the
    /// first error is returned once both have run.
    pub async fn run(&self, poll: bool, process: bool) -> Result<(), MailerError> {
        let mut outcome = Ok(());

        if poll {
            if let Err(err) = self.poll().await {
                tracing::error!("Poll failed: {:?}", err);
                outcome = Err(err);
            }
        }

        if process {
            if let Err(err) = self.process().await {
                tracing::error!("Process failed: {:?}", err);
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }

        outcome
    }

    /// Drains the queue into the journal.
    ///
    /// Only messages that were journaled are acknowledged. Anything else stays on the queue for
    /// a later poll.
    #[tracing::instrument(name = "Poll message queue", skip(self))]
    pub async fn poll(&self) -> Result<PollReport, MailerError> {
        let mut report = PollReport::default();

        while let Some(message) = self
            .source
            .get_next_message()
            .await
            .map_err(MailerError::Receive)?
        {
            report.received += 1;

            let intent = match RecipientIntent::parse(message.body(), &self.default_list_id) {
                Ok(intent) => intent,
                Err(err) => {
                    tracing::error!(error = %err, "Skipping invalid message");
                    report.skipped += 1;
                    continue;
                }
            };

            if let Err(err) = self
                .journal
                .set_recipient_pending_state(
                    &intent.email,
                    &intent.list_ids,
                    intent.status,
                    &intent.attributes,
                )
                .await
            {
                tracing::error!(
                    recipient_email = %intent.email,
                    "Failed to journal intent, leaving it queued: {:?}",
                    err
                );
                report.skipped += 1;
                continue;
            }
            report.journaled += 1;

            if let Err(err) = self.source.acknowledge(&message).await {
                tracing::error!(error = %err, "Failed to acknowledge journaled message");
                report.unacknowledged += 1;
            }
        }

        tracing::info!(
            received = report.received,
            journaled = report.journaled,
            skipped = report.skipped,
            unacknowledged = report.unacknowledged,
            "Poll finished"
        );

        Ok(report)
    }

    /// Pushes every pending membership to the provider and records the outcome.
    ///
    /// A provider failure marks that membership `failed` and the sweep moves on; failing to record
    /// an outcome stops the sweep.
    #[tracing::instrument(name = "Reconcile pending list recipients", skip(self))]
    pub async fn process(&self) -> Result<ProcessReport, MailerError> {
        let pending = self
            .journal
            .get_recipient_pending_state()
            .await
            .map_err(MailerError::PendingState)?;
        let mut report = ProcessReport::default();

        for list_recipient in pending {
            let outcome = match self.notifier.notify(&list_recipient).await {
                Ok(status) => status,
                Err(err) => {
                    tracing::error!(
                        list_recipient_id = %list_recipient.id,
                        list_id = %list_recipient.list_id,
                        error = %err,
                        "Provider call failed, marking list recipient as failed"
                    );
                    RecipientStatus::Failed
                }
            };

            self.journal
                .update_list_recipient(list_recipient.id, outcome)
                .await
                .map_err(|source| MailerError::RecordOutcome {
                    id: list_recipient.id,
                    source,
                })?;

            match outcome {
                RecipientStatus::Subscribed => report.subscribed += 1,
                RecipientStatus::Unsubscribed => report.unsubscribed += 1,
                _ => report.failed += 1,
            }
        }

        tracing::info!(
            subscribed = report.subscribed,
            unsubscribed = report.unsubscribed,
            failed = report.failed,
            "Reconciliation finished"
        );

        Ok(report)
    }
}
