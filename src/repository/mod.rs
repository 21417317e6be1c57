use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use crate::domain::{
    ListRecipient, ListRecipientId, NewListRecipient, PendingListRecipient, Recipient,
    RecipientEmail, RecipientId, RecipientStatus,
};

pub mod memory;
pub mod postgres;

pub use memory::{Fault, InMemoryRepository};
pub use postgres::PgRepository;

#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable store of recipients and their list memberships.
#[async_trait]
pub trait Repository: Send + Sync {
    type Transaction: RecipientTransaction;

    async fn begin(&self) -> Result<Self::Transaction, RepositoryError>;

    /// Memberships in any of `statuses`, joined with their recipient's email, ordered by id.
    async fn get_recipient_data_by_status(
        &self,
        statuses: &[RecipientStatus],
    ) -> Result<Vec<PendingListRecipient>, RepositoryError>;
}

/// Unit of work against the store.
///
/// Dropping a transaction without calling [`RecipientTransaction::commit`] rolls it back.
#[async_trait]
pub trait RecipientTransaction: Send {
    async fn get_recipient_by_email(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<Option<Recipient>, RepositoryError>;

    async fn insert_recipient(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<RecipientId, RepositoryError>;

    async fn get_list_recipient(
        &mut self,
        id: ListRecipientId,
    ) -> Result<Option<ListRecipient>, RepositoryError>;

    async fn get_list_recipient_by_email_and_list_id(
        &mut self,
        email: &RecipientEmail,
        list_id: &str,
    ) -> Result<Option<ListRecipient>, RepositoryError>;

    async fn insert_list_recipient(
        &mut self,
        list_recipient: &NewListRecipient,
    ) -> Result<ListRecipientId, RepositoryError>;

    /// Overwrites status and attributes (attributes are replaced, not merged).
    async fn update_list_recipient(
        &mut self,
        list_recipient: &ListRecipient,
    ) -> Result<(), RepositoryError>;

    async fn update_list_recipient_status(
        &mut self,
        id: ListRecipientId,
        status: RecipientStatus,
    ) -> Result<(), RepositoryError>;

    async fn commit(self) -> Result<(), RepositoryError>;
}

pub type TransactionFuture<'t, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 't>>;

/// Runs `work` inside a fresh transaction, committing only if it succeeds.
///
/// An error from `work`, or a panic inside it, drops the transaction and rolls it back.
pub async fn run_in_transaction<R, T, E, F>(repository: &R, work: F) -> Result<T, E>
where
    R: Repository + ?Sized,
    E: From<RepositoryError>,
    F: for<'t> FnOnce(&'t mut R::Transaction) -> TransactionFuture<'t, T, E>,
{
    let mut transaction = repository.begin().await?;
    let value = work(&mut transaction).await?;

    transaction.commit().await?;

    Ok(value)
}
