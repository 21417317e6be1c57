use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::{Attributes, RecipientEmail};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// The mailing-list provider's side of a membership.
#[async_trait]
pub trait ListClient: Send + Sync {
    async fn subscribe(
        &self,
        email: &RecipientEmail,
        list_id: &str,
        attributes: &Attributes,
    ) -> Result<(), ClientError>;

    async fn unsubscribe(&self, email: &RecipientEmail, list_id: &str) -> Result<(), ClientError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("API key has no data center suffix")]
    InvalidApiKey,
    #[error("invalid Mailchimp base URL {0}")]
    InvalidBaseUrl(String),
    #[error("request to Mailchimp failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mailchimp rejected the request with HTTP status {status}")]
    Rejected { status: StatusCode, body: String },
}

pub struct MailChimpClient {
    http_client: Client,
    base_url: Url,
    api_key: Secret<String>,
}

#[derive(serde::Serialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum MemberStatus {
    Subscribed,
    Unsubscribed,
}

/// Body of an idempotent member upsert.
#[derive(serde::Serialize)]
struct PutListMemberBody<'a> {
    email_address: &'a str,
    status_if_new: MemberStatus,
    status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge_fields: Option<&'a Attributes>,
}

/// API keys end with `-<dc>`, naming the data center that hosts the account.
fn data_center_url(api_key: &str) -> Result<String, ClientError> {
    match api_key.rsplit_once('-') {
        Some((_, dc)) if !dc.is_empty() => Ok(format!("https://{}.api.mailchimp.com/3.0", dc)),
        _ => Err(ClientError::InvalidApiKey),
    }
}

impl MailChimpClient {
    pub fn new(
        base_url: Option<String>,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<MailChimpClient, ClientError> {
        let base_url = match base_url {
            Some(base_url) => base_url,
            None => data_center_url(api_key.expose_secret())?,
        };
        let base_url =
            Url::parse(&base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(MailChimpClient {
            http_client,
            base_url,
            api_key,
        })
    }

    fn member_url(&self, email: &RecipientEmail, list_id: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["lists", list_id, "members", email.as_ref()]);

        Ok(url)
    }

    #[tracing::instrument(name = "Upsert Mailchimp list member", skip(self, body, url), fields(url = %url))]
    async fn put_member(&self, url: Url, body: &PutListMemberBody<'_>) -> Result<(), ClientError> {
        let response = self
            .http_client
            .put(url)
            .basic_auth("mailsling", Some(self.api_key.expose_secret()))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Mailchimp rejected the request");

            return Err(ClientError::Rejected { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl ListClient for MailChimpClient {
    async fn subscribe(
        &self,
        email: &RecipientEmail,
        list_id: &str,
        attributes: &Attributes,
    ) -> Result<(), ClientError> {
        let body = PutListMemberBody {
            email_address: email.as_ref(),
            status_if_new: MemberStatus::Subscribed,
            status: MemberStatus::Subscribed,
            merge_fields: Some(attributes).filter(|attributes| !attributes.is_empty()),
        };

        self.put_member(self.member_url(email, list_id)?, &body).await
    }

    async fn unsubscribe(&self, email: &RecipientEmail, list_id: &str) -> Result<(), ClientError> {
        let body = PutListMemberBody {
            email_address: email.as_ref(),
            status_if_new: MemberStatus::Unsubscribed,
            status: MemberStatus::Unsubscribed,
            merge_fields: None,
        };

        self.put_member(self.member_url(email, list_id)?, &body).await
    }
}
