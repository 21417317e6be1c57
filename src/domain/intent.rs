use serde::Deserialize;

use crate::domain::recipient::Attributes;
use crate::domain::recipient_email::RecipientEmail;
use crate::domain::recipient_status::PendingStatus;

/// Raw shape of a queued message body.
#[derive(Deserialize, Debug)]
pub struct RecipientIntentBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub email: Option<String>,
    #[serde(rename = "listIds")]
    pub list_ids: Option<Vec<String>>,
    pub attributes: Option<Attributes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    SignUp,
    Subscribe,
    Unsubscribe,
}

impl IntentKind {
    pub fn parse(kind: &str) -> Result<IntentKind, IntentError> {
        match kind {
            "sign_up" => Ok(IntentKind::SignUp),
            "subscribe" => Ok(IntentKind::Subscribe),
            "unsubscribe" => Ok(IntentKind::Unsubscribe),
            unknown => Err(IntentError::UnknownType(unknown.to_string())),
        }
    }

    pub fn target_status(&self) -> PendingStatus {
        match self {
            IntentKind::SignUp | IntentKind::Subscribe => PendingStatus::New,
            IntentKind::Unsubscribe => PendingStatus::Unsubscribing,
        }
    }
}

/// A validated request to move a recipient's memberships toward a pending status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientIntent {
    pub email: RecipientEmail,
    pub list_ids: Vec<String>,
    pub status: PendingStatus,
    pub attributes: Attributes,
}

#[derive(thiserror::Error, Debug)]
pub enum IntentError {
    #[error("message is not a valid intent: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("message has no email")]
    MissingEmail,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("message lists a blank list id")]
    BlankListId,
}

impl RecipientIntent {
    /// Parses a message body, falling back to `default_list_id` when it names no lists.
    pub fn parse(text: &str, default_list_id: &str) -> Result<RecipientIntent, IntentError> {
        let body: RecipientIntentBody = serde_json::from_str(text)?;
        let status = IntentKind::parse(&body.kind)?.target_status();
        let email = body
            .email
            .ok_or(IntentError::MissingEmail)
            .and_then(|email| RecipientEmail::parse(email).map_err(|_| IntentError::MissingEmail))?;

        let mut list_ids: Vec<String> = Vec::new();
        for list_id in body.list_ids.unwrap_or_default() {
            if list_id.trim().is_empty() {
                return Err(IntentError::BlankListId);
            }
            if !list_ids.contains(&list_id) {
                list_ids.push(list_id);
            }
        }
        if list_ids.is_empty() {
            list_ids.push(default_list_id.to_string());
        }

        Ok(RecipientIntent {
            email,
            list_ids,
            status,
            attributes: body.attributes.unwrap_or_default(),
        })
    }
}
