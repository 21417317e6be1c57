pub mod intent;
pub mod recipient;
pub mod recipient_email;
pub mod recipient_status;

pub use intent::{IntentError, IntentKind, RecipientIntent};
pub use recipient::{
    Attributes, ListRecipient, ListRecipientId, NewListRecipient, PendingListRecipient,
    Recipient, RecipientId,
};
pub use recipient_email::RecipientEmail;
pub use recipient_status::{PendingStatus, RecipientStatus};
