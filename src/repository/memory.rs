use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    ListRecipient, ListRecipientId, NewListRecipient, PendingListRecipient, Recipient,
    RecipientEmail, RecipientId, RecipientStatus,
};
use crate::repository::{RecipientTransaction, Repository, RepositoryError};

/// Operation of [`InMemoryRepository`] that can be made to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Commit,
    RecipientLookup { email: String },
    RecipientInsert { email: String },
    ListRecipientLookup { list_id: String },
    ListRecipientFetch(ListRecipientId),
    ListRecipientInsert { list_id: String },
    ListRecipientUpdate { list_id: String },
    StatusUpdate(ListRecipientId),
    PendingStateLookup,
}

#[derive(Debug, Clone, Default)]
struct State {
    recipients: Vec<Recipient>,
    list_recipients: Vec<ListRecipient>,
    last_recipient_id: i64,
    last_list_recipient_id: i64,
}

/// In-memory store for tests.
///
/// Transactions are serialized: each one holds the store lock, works on a staged copy, and
/// swaps it in on commit. The schema's uniqueness rules are enforced the same way Postgres
/// enforces them.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent matching operation fail until [`Self::clear_faults`].
    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.lock().await.insert(fault);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    pub async fn recipients(&self) -> Vec<Recipient> {
        self.state.lock().await.recipients.clone()
    }

    pub async fn list_recipients(&self) -> Vec<ListRecipient> {
        self.state.lock().await.list_recipients.clone()
    }

    pub async fn list_recipient(&self, email: &str, list_id: &str) -> Option<ListRecipient> {
        let state = self.state.lock().await;
        let recipient = state.recipients.iter().find(|r| r.email.as_ref() == email)?;

        state
            .list_recipients
            .iter()
            .find(|lr| lr.recipient_id == recipient.id && lr.list_id == list_id)
            .cloned()
    }
}

async fn check(faults: &Mutex<HashSet<Fault>>, fault: Fault) -> Result<(), RepositoryError> {
    if faults.lock().await.contains(&fault) {
        return Err(RepositoryError::Unavailable(format!("injected {:?}", fault)));
    }
    Ok(())
}

#[async_trait]
impl Repository for InMemoryRepository {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Transaction, RepositoryError> {
        check(&self.faults, Fault::Begin).await?;

        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();

        Ok(InMemoryTransaction {
            guard,
            staged,
            faults: self.faults.clone(),
        })
    }

    async fn get_recipient_data_by_status(
        &self,
        statuses: &[RecipientStatus],
    ) -> Result<Vec<PendingListRecipient>, RepositoryError> {
        check(&self.faults, Fault::PendingStateLookup).await?;

        let state = self.state.lock().await;
        let mut pending = Vec::new();

        for lr in state
            .list_recipients
            .iter()
            .filter(|lr| statuses.contains(&lr.status))
        {
            let recipient = state
                .recipients
                .iter()
                .find(|r| r.id == lr.recipient_id)
                .ok_or_else(|| {
                    RepositoryError::Corrupt(format!("list recipient {} has no recipient", lr.id))
                })?;

            pending.push(PendingListRecipient {
                id: lr.id,
                email: recipient.email.clone(),
                list_id: lr.list_id.clone(),
                status: lr.status,
                attributes: lr.attributes.clone(),
            });
        }

        Ok(pending)
    }
}

#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: State,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl InMemoryTransaction {
    fn position(&self, id: ListRecipientId) -> Option<usize> {
        self.staged.list_recipients.iter().position(|lr| lr.id == id)
    }
}

#[async_trait]
impl RecipientTransaction for InMemoryTransaction {
    async fn get_recipient_by_email(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<Option<Recipient>, RepositoryError> {
        check(
            &self.faults,
            Fault::RecipientLookup {
                email: email.to_string(),
            },
        )
        .await?;

        Ok(self
            .staged
            .recipients
            .iter()
            .find(|r| &r.email == email)
            .cloned())
    }

    async fn insert_recipient(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<RecipientId, RepositoryError> {
        check(
            &self.faults,
            Fault::RecipientInsert {
                email: email.to_string(),
            },
        )
        .await?;

        if self.staged.recipients.iter().any(|r| &r.email == email) {
            return Err(RepositoryError::Conflict(format!(
                "recipient {} already exists",
                email
            )));
        }

        self.staged.last_recipient_id += 1;
        let id = RecipientId(self.staged.last_recipient_id);
        self.staged.recipients.push(Recipient {
            id,
            email: email.clone(),
        });

        Ok(id)
    }

    async fn get_list_recipient(
        &mut self,
        id: ListRecipientId,
    ) -> Result<Option<ListRecipient>, RepositoryError> {
        check(&self.faults, Fault::ListRecipientFetch(id)).await?;

        Ok(self.position(id).map(|i| self.staged.list_recipients[i].clone()))
    }

    async fn get_list_recipient_by_email_and_list_id(
        &mut self,
        email: &RecipientEmail,
        list_id: &str,
    ) -> Result<Option<ListRecipient>, RepositoryError> {
        check(
            &self.faults,
            Fault::ListRecipientLookup {
                list_id: list_id.to_string(),
            },
        )
        .await?;

        let Some(recipient) = self.staged.recipients.iter().find(|r| &r.email == email) else {
            return Ok(None);
        };

        Ok(self
            .staged
            .list_recipients
            .iter()
            .find(|lr| lr.recipient_id == recipient.id && lr.list_id == list_id)
            .cloned())
    }

    async fn insert_list_recipient(
        &mut self,
        list_recipient: &NewListRecipient,
    ) -> Result<ListRecipientId, RepositoryError> {
        check(
            &self.faults,
            Fault::ListRecipientInsert {
                list_id: list_recipient.list_id.clone(),
            },
        )
        .await?;

        if !self
            .staged
            .recipients
            .iter()
            .any(|r| r.id == list_recipient.recipient_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "recipient {} does not exist",
                list_recipient.recipient_id
            )));
        }
        if self.staged.list_recipients.iter().any(|lr| {
            lr.recipient_id == list_recipient.recipient_id && lr.list_id == list_recipient.list_id
        }) {
            return Err(RepositoryError::Conflict(format!(
                "recipient {} is already on list {}",
                list_recipient.recipient_id, list_recipient.list_id
            )));
        }

        self.staged.last_list_recipient_id += 1;
        let id = ListRecipientId(self.staged.last_list_recipient_id);
        self.staged.list_recipients.push(ListRecipient {
            id,
            recipient_id: list_recipient.recipient_id,
            list_id: list_recipient.list_id.clone(),
            status: list_recipient.status,
            attributes: list_recipient.attributes.clone(),
            last_modified: Utc::now(),
        });

        Ok(id)
    }

    async fn update_list_recipient(
        &mut self,
        list_recipient: &ListRecipient,
    ) -> Result<(), RepositoryError> {
        check(
            &self.faults,
            Fault::ListRecipientUpdate {
                list_id: list_recipient.list_id.clone(),
            },
        )
        .await?;

        let i = self.position(list_recipient.id).ok_or_else(|| {
            RepositoryError::Conflict(format!("list recipient {} does not exist", list_recipient.id))
        })?;
        let stored = &mut self.staged.list_recipients[i];
        stored.status = list_recipient.status;
        stored.attributes = list_recipient.attributes.clone();
        stored.last_modified = Utc::now();

        Ok(())
    }

    async fn update_list_recipient_status(
        &mut self,
        id: ListRecipientId,
        status: RecipientStatus,
    ) -> Result<(), RepositoryError> {
        check(&self.faults, Fault::StatusUpdate(id)).await?;

        let i = self.position(id).ok_or_else(|| {
            RepositoryError::Conflict(format!("list recipient {} does not exist", id))
        })?;
        let stored = &mut self.staged.list_recipients[i];
        stored.status = status;
        stored.last_modified = Utc::now();

        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        check(&self.faults, Fault::Commit).await?;

        let InMemoryTransaction {
            mut guard, staged, ..
        } = self;
        *guard = staged;

        Ok(())
    }
}
