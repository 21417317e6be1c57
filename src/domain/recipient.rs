use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::recipient_email::RecipientEmail;
use crate::domain::recipient_status::RecipientStatus;

/// Free-form metadata forwarded to the provider with a membership (merge fields).
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RecipientId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ListRecipientId(pub i64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ListRecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub email: RecipientEmail,
}

/// Membership of one recipient on one mailing list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ListRecipient {
    pub id: ListRecipientId,
    pub recipient_id: RecipientId,
    pub list_id: String,
    pub status: RecipientStatus,
    pub attributes: Attributes,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListRecipient {
    pub recipient_id: RecipientId,
    pub list_id: String,
    pub status: RecipientStatus,
    pub attributes: Attributes,
}

/// A membership joined with its recipient's email, as read by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PendingListRecipient {
    pub id: ListRecipientId,
    pub email: RecipientEmail,
    pub list_id: String,
    pub status: RecipientStatus,
    pub attributes: Attributes,
}
