use std::fmt;

/// Lifecycle status of a list membership.
///
/// `New` and `Unsubscribing` are assigned by inbound intents and wait for reconciliation. The
/// remaining variants are reconciliation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    New,
    Subscribed,
    Failed,
    Unsubscribing,
    Unsubscribed,
}

impl RecipientStatus {
    pub const PENDING: [RecipientStatus; 2] =
        [RecipientStatus::New, RecipientStatus::Unsubscribing];

    pub fn is_pending(&self) -> bool {
        matches!(self, RecipientStatus::New | RecipientStatus::Unsubscribing)
    }

    pub fn parse(status: &str) -> Result<RecipientStatus, String> {
        match status {
            "new" => Ok(RecipientStatus::New),
            "subscribed" => Ok(RecipientStatus::Subscribed),
            "failed" => Ok(RecipientStatus::Failed),
            "unsubscribing" => Ok(RecipientStatus::Unsubscribing),
            "unsubscribed" => Ok(RecipientStatus::Unsubscribed),
            _ => Err(format!("{} is not a valid recipient status", status)),
        }
    }
}

impl AsRef<str> for RecipientStatus {
    fn as_ref(&self) -> &str {
        match self {
            RecipientStatus::New => "new",
            RecipientStatus::Subscribed => "subscribed",
            RecipientStatus::Failed => "failed",
            RecipientStatus::Unsubscribing => "unsubscribing",
            RecipientStatus::Unsubscribed => "unsubscribed",
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// The statuses an intent is allowed to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    New,
    Unsubscribing,
}

impl From<PendingStatus> for RecipientStatus {
    fn from(status: PendingStatus) -> Self {
        match status {
            PendingStatus::New => RecipientStatus::New,
            PendingStatus::Unsubscribing => RecipientStatus::Unsubscribing,
        }
    }
}

impl TryFrom<RecipientStatus> for PendingStatus {
    type Error = RecipientStatus;

    fn try_from(status: RecipientStatus) -> Result<Self, Self::Error> {
        match status {
            RecipientStatus::New => Ok(PendingStatus::New),
            RecipientStatus::Unsubscribing => Ok(PendingStatus::Unsubscribing),
            other => Err(other),
        }
    }
}
