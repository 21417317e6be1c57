use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgConnection, PgPool, Postgres, Row};
use std::collections::HashMap;

use crate::domain::{
    Attributes, ListRecipient, ListRecipientId, NewListRecipient, PendingListRecipient, Recipient,
    RecipientEmail, RecipientId, RecipientStatus,
};
use crate::repository::{RecipientTransaction, Repository, RepositoryError};

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn parse_email(row: &PgRow) -> Result<RecipientEmail, RepositoryError> {
    RecipientEmail::parse(row.try_get("email")?).map_err(RepositoryError::Corrupt)
}

fn parse_status(row: &PgRow) -> Result<RecipientStatus, RepositoryError> {
    let status: String = row.try_get("status")?;

    RecipientStatus::parse(&status).map_err(RepositoryError::Corrupt)
}

fn map_list_recipient(row: &PgRow, attributes: Attributes) -> Result<ListRecipient, RepositoryError> {
    Ok(ListRecipient {
        id: ListRecipientId(row.try_get("id")?),
        recipient_id: RecipientId(row.try_get("recipient_id")?),
        list_id: row.try_get("list_id")?,
        status: parse_status(row)?,
        attributes,
        last_modified: row.try_get("last_modified")?,
    })
}

#[tracing::instrument(name = "Load list recipient attributes", skip(conn))]
async fn load_attributes(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<HashMap<i64, Attributes>, RepositoryError> {
    let rows = sqlx::query(
        r#"
        SELECT list_recipient_id, name, value
        FROM list_recipient_attributes
        WHERE list_recipient_id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await?;

    let mut attributes: HashMap<i64, Attributes> = HashMap::new();
    for row in rows {
        attributes
            .entry(row.try_get("list_recipient_id")?)
            .or_default()
            .insert(row.try_get("name")?, row.try_get("value")?);
    }

    Ok(attributes)
}

#[tracing::instrument(name = "Replace list recipient attributes", skip(conn, attributes))]
async fn replace_attributes(
    conn: &mut PgConnection,
    id: i64,
    attributes: &Attributes,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM list_recipient_attributes WHERE list_recipient_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if attributes.is_empty() {
        return Ok(());
    }

    let (names, values): (Vec<String>, Vec<String>) = attributes
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .unzip();

    sqlx::query(
        r#"
        INSERT INTO list_recipient_attributes (list_recipient_id, name, value)
        SELECT $1, name, value FROM UNNEST($2::text[], $3::text[]) AS a(name, value)
        "#,
    )
    .bind(id)
    .bind(names)
    .bind(values)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

impl PgTransaction {
    async fn fetch_list_recipient(
        &mut self,
        row: Option<PgRow>,
    ) -> Result<Option<ListRecipient>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id")?;
        let attributes = load_attributes(&mut self.tx, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();

        map_list_recipient(&row, attributes).map(Some)
    }
}

#[async_trait]
impl Repository for PgRepository {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<Self::Transaction, RepositoryError> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }

    #[tracing::instrument(name = "Fetch list recipients by status", skip(self))]
    async fn get_recipient_data_by_status(
        &self,
        statuses: &[RecipientStatus],
    ) -> Result<Vec<PendingListRecipient>, RepositoryError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_ref().to_string()).collect();
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            SELECT lr.id, r.email, lr.list_id, lr.status
            FROM list_recipients lr
            JOIN recipients r ON r.id = lr.recipient_id
            WHERE lr.status = ANY($1)
            ORDER BY lr.id
            "#,
        )
        .bind(statuses)
        .fetch_all(&mut *tx)
        .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut attributes = load_attributes(&mut tx, &ids).await?;

        let pending = rows
            .iter()
            .map(|row| -> Result<PendingListRecipient, RepositoryError> {
                let id: i64 = row.try_get("id")?;
                Ok(PendingListRecipient {
                    id: ListRecipientId(id),
                    email: parse_email(row)?,
                    list_id: row.try_get("list_id")?,
                    status: parse_status(row)?,
                    attributes: attributes.remove(&id).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;

        Ok(pending)
    }
}

#[async_trait]
impl RecipientTransaction for PgTransaction {
    #[tracing::instrument(name = "Fetch recipient by email", skip(self))]
    async fn get_recipient_by_email(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<Option<Recipient>, RepositoryError> {
        let row = sqlx::query("SELECT id, email FROM recipients WHERE email = $1")
            .bind(email.as_ref())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(|row| -> Result<Recipient, RepositoryError> {
            Ok(Recipient {
                id: RecipientId(row.try_get("id")?),
                email: parse_email(&row)?,
            })
        })
        .transpose()
    }

    #[tracing::instrument(name = "Insert a new recipient", skip(self))]
    async fn insert_recipient(
        &mut self,
        email: &RecipientEmail,
    ) -> Result<RecipientId, RepositoryError> {
        let row = sqlx::query("INSERT INTO recipients (email) VALUES ($1) RETURNING id")
            .bind(email.as_ref())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(RecipientId(row.try_get("id")?))
    }

    #[tracing::instrument(name = "Fetch list recipient", skip(self))]
    async fn get_list_recipient(
        &mut self,
        id: ListRecipientId,
    ) -> Result<Option<ListRecipient>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, recipient_id, list_id, status, last_modified
            FROM list_recipients
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&mut *self.tx)
        .await?;

        self.fetch_list_recipient(row).await
    }

    #[tracing::instrument(name = "Fetch list recipient by email and list", skip(self))]
    async fn get_list_recipient_by_email_and_list_id(
        &mut self,
        email: &RecipientEmail,
        list_id: &str,
    ) -> Result<Option<ListRecipient>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT lr.id, lr.recipient_id, lr.list_id, lr.status, lr.last_modified
            FROM list_recipients lr
            JOIN recipients r ON r.id = lr.recipient_id
            WHERE r.email = $1 AND lr.list_id = $2
            "#,
        )
        .bind(email.as_ref())
        .bind(list_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        self.fetch_list_recipient(row).await
    }

    #[tracing::instrument(name = "Insert a new list recipient", skip(self))]
    async fn insert_list_recipient(
        &mut self,
        list_recipient: &NewListRecipient,
    ) -> Result<ListRecipientId, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO list_recipients (recipient_id, list_id, status, last_modified)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(list_recipient.recipient_id.0)
        .bind(&list_recipient.list_id)
        .bind(list_recipient.status.as_ref())
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;
        let id: i64 = row.try_get("id")?;

        replace_attributes(&mut self.tx, id, &list_recipient.attributes).await?;

        Ok(ListRecipientId(id))
    }

    #[tracing::instrument(name = "Update list recipient", skip(self))]
    async fn update_list_recipient(
        &mut self,
        list_recipient: &ListRecipient,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE list_recipients SET status = $2, last_modified = $3 WHERE id = $1")
            .bind(list_recipient.id.0)
            .bind(list_recipient.status.as_ref())
            .bind(Utc::now())
            .execute(&mut *self.tx)
            .await?;

        replace_attributes(&mut self.tx, list_recipient.id.0, &list_recipient.attributes).await
    }

    #[tracing::instrument(name = "Update list recipient status", skip(self))]
    async fn update_list_recipient_status(
        &mut self,
        id: ListRecipientId,
        status: RecipientStatus,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE list_recipients SET status = $2, last_modified = $3 WHERE id = $1")
                .bind(id.0)
                .bind(status.as_ref())
                .bind(Utc::now())
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "list recipient {} does not exist",
                id
            )));
        }

        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;

        Ok(())
    }
}
