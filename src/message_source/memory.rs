use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::message_source::{Message, MessageSource, MessageSourceError};

enum Delivery {
    Message(Message),
    Failure(String),
}

#[derive(Default)]
struct Queue {
    deliveries: VecDeque<Delivery>,
    acknowledged: Vec<Message>,
    failing_acknowledgements: HashSet<String>,
}

/// In-memory queue for tests, with scripted receive and acknowledgment failures.
#[derive(Clone, Default)]
pub struct InMemoryMessageSource {
    queue: Arc<Mutex<Queue>>,
}

impl InMemoryMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, body: &str) {
        self.queue
            .lock()
            .await
            .deliveries
            .push_back(Delivery::Message(Message::new(body.to_string())));
    }

    /// Queues a receive failure at the current end of the queue.
    pub async fn push_failure(&self, reason: &str) {
        self.queue
            .lock()
            .await
            .deliveries
            .push_back(Delivery::Failure(reason.to_string()));
    }

    /// Makes acknowledging any message with this body fail.
    pub async fn fail_acknowledgement(&self, body: &str) {
        self.queue
            .lock()
            .await
            .failing_acknowledgements
            .insert(body.to_string());
    }

    pub async fn acknowledged(&self) -> Vec<Message> {
        self.queue.lock().await.acknowledged.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.queue.lock().await.deliveries.len()
    }
}

#[async_trait]
impl MessageSource for InMemoryMessageSource {
    async fn get_next_message(&self) -> Result<Option<Message>, MessageSourceError> {
        match self.queue.lock().await.deliveries.pop_front() {
            Some(Delivery::Message(message)) => Ok(Some(message)),
            Some(Delivery::Failure(reason)) => Err(MessageSourceError::Unavailable(reason)),
            None => Ok(None),
        }
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), MessageSourceError> {
        let mut queue = self.queue.lock().await;

        if queue.failing_acknowledgements.contains(message.body()) {
            return Err(MessageSourceError::Unavailable(format!(
                "cannot acknowledge {:?}",
                message.body()
            )));
        }
        queue.acknowledged.push(message.clone());

        Ok(())
    }
}
