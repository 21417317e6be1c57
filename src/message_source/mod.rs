use async_trait::async_trait;

pub mod memory;
pub mod redis_queue;

pub use memory::InMemoryMessageSource;
pub use redis_queue::RedisMessageSource;

/// A message read from the queue but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: String,
}

impl Message {
    pub fn new(body: String) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MessageSourceError {
    #[error("queue request failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("queue unavailable: {0}")]
    Unavailable(String),
}

/// Queue of inbound intent messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Returns the next message without removing it from the queue, or `None` once drained.
    async fn get_next_message(&self) -> Result<Option<Message>, MessageSourceError>;

    /// Marks `message` as durably processed.
    async fn acknowledge(&self, message: &Message) -> Result<(), MessageSourceError>;
}
