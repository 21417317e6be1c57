use crate::domain::{
    Attributes, ListRecipientId, NewListRecipient, PendingListRecipient, PendingStatus,
    RecipientEmail, RecipientStatus,
};
use crate::repository::{
    run_in_transaction, RecipientTransaction, Repository, RepositoryError,
};

#[derive(thiserror::Error, Debug)]
pub enum JournalError {
    #[error("an intent must name at least one list")]
    NoLists,
    #[error("couldn't check for existing recipient")]
    RecipientLookup(#[source] RepositoryError),
    #[error("couldn't insert recipient")]
    RecipientInsert(#[source] RepositoryError),
    #[error("couldn't check for existing list recipient on list {list_id}")]
    ListRecipientLookup {
        list_id: String,
        #[source]
        source: RepositoryError,
    },
    #[error("couldn't insert list recipient on list {list_id}")]
    ListRecipientInsert {
        list_id: String,
        #[source]
        source: RepositoryError,
    },
    #[error("couldn't look up list recipient {id}")]
    ListRecipientFetch {
        id: ListRecipientId,
        #[source]
        source: RepositoryError,
    },
    #[error("couldn't update list recipient {id}")]
    ListRecipientUpdate {
        id: ListRecipientId,
        #[source]
        source: RepositoryError,
    },
    #[error("list recipient {0} does not exist")]
    ListRecipientNotFound(ListRecipientId),
    #[error("couldn't get pending list recipients")]
    PendingStateLookup(#[source] RepositoryError),
    #[error("transaction failed")]
    Transaction(#[from] RepositoryError),
}

/// Owner of every membership state transition.
pub struct Journal<R> {
    repository: R,
}

impl<R: Repository> Journal<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Records the latest intent for `email` on every list in `list_ids`, atomically.
    ///
    /// Existing memberships are overwritten, whatever their current status.
    #[tracing::instrument(
        name = "Set recipient pending state",
        skip(self, email, attributes),
        fields(recipient_email = %email)
    )]
    pub async fn set_recipient_pending_state(
        &self,
        email: &RecipientEmail,
        list_ids: &[String],
        status: PendingStatus,
        attributes: &Attributes,
    ) -> Result<(), JournalError> {
        if list_ids.is_empty() {
            return Err(JournalError::NoLists);
        }

        let email = email.clone();
        let mut lists: Vec<String> = Vec::with_capacity(list_ids.len());
        for list_id in list_ids {
            if !lists.contains(list_id) {
                lists.push(list_id.clone());
            }
        }
        let status = RecipientStatus::from(status);
        let attributes = attributes.clone();

        run_in_transaction(&self.repository, move |tx| {
            Box::pin(async move {
                let existing = tx
                    .get_recipient_by_email(&email)
                    .await
                    .map_err(JournalError::RecipientLookup)?;
                let found = existing.is_some();

                let recipient_id = match existing {
                    Some(recipient) => recipient.id,
                    None => tx
                        .insert_recipient(&email)
                        .await
                        .map_err(JournalError::RecipientInsert)?,
                };

                for list_id in lists {
                    // A recipient inserted by this transaction cannot have memberships yet
                    let current = if found {
                        tx.get_list_recipient_by_email_and_list_id(&email, &list_id)
                            .await
                            .map_err(|source| JournalError::ListRecipientLookup {
                                list_id: list_id.clone(),
                                source,
                            })?
                    } else {
                        None
                    };

                    match current {
                        Some(mut list_recipient) => {
                            list_recipient.status = status;
                            list_recipient.attributes = attributes.clone();

                            tx.update_list_recipient(&list_recipient)
                                .await
                                .map_err(|source| JournalError::ListRecipientUpdate {
                                    id: list_recipient.id,
                                    source,
                                })?;
                        }
                        None => {
                            let new_list_recipient = NewListRecipient {
                                recipient_id,
                                list_id,
                                status,
                                attributes: attributes.clone(),
                            };

                            tx.insert_list_recipient(&new_list_recipient)
                                .await
                                .map_err(|source| JournalError::ListRecipientInsert {
                                    list_id: new_list_recipient.list_id.clone(),
                                    source,
                                })?;
                        }
                    }
                }

                Ok::<_, JournalError>(())
            })
        })
        .await
    }

    /// Memberships awaiting reconciliation, in a stable order.
    #[tracing::instrument(name = "Get recipient pending state", skip(self))]
    pub async fn get_recipient_pending_state(
        &self,
    ) -> Result<Vec<PendingListRecipient>, JournalError> {
        self.repository
            .get_recipient_data_by_status(&RecipientStatus::PENDING)
            .await
            .map_err(JournalError::PendingStateLookup)
    }

    /// Records a reconciliation outcome. Attributes are left untouched.
    #[tracing::instrument(name = "Update list recipient status", skip(self))]
    pub async fn update_list_recipient(
        &self,
        id: ListRecipientId,
        status: RecipientStatus,
    ) -> Result<(), JournalError> {
        run_in_transaction(&self.repository, move |tx| {
            Box::pin(async move {
                let list_recipient = tx
                    .get_list_recipient(id)
                    .await
                    .map_err(|source| JournalError::ListRecipientFetch { id, source })?
                    .ok_or(JournalError::ListRecipientNotFound(id))?;

                tx.update_list_recipient_status(list_recipient.id, status)
                    .await
                    .map_err(|source| JournalError::ListRecipientUpdate { id, source })
            })
        })
        .await
    }
}
