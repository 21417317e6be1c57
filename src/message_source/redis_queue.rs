use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::config::QueueSettings;
use crate::message_source::{Message, MessageSource, MessageSourceError};

/// Reliable queue on a pair of Redis lists.
///
/// Producers `LPUSH` message bodies onto the queue list. Reading moves the oldest entry onto the
/// in-flight list in one atomic step, and acknowledging removes it from there, so a message that
/// is never acknowledged stays in Redis until [`RedisMessageSource::requeue_in_flight`] runs.
pub struct RedisMessageSource {
    connection: MultiplexedConnection,
    queue: String,
    in_flight: String,
}

impl RedisMessageSource {
    #[tracing::instrument(name = "Connect to the message queue", skip(settings), fields(queue = %settings.name))]
    pub async fn connect(settings: &QueueSettings) -> Result<Self, MessageSourceError> {
        let client = redis::Client::open(settings.get_address())?;
        let connection = client.get_multiplexed_tokio_connection().await?;

        Ok(Self {
            connection,
            queue: settings.name.clone(),
            in_flight: settings.get_in_flight_name(),
        })
    }

    /// Moves every unacknowledged message back onto the queue, returning how many were moved.
    #[tracing::instrument(name = "Requeue in-flight messages", skip(self), fields(queue = %self.queue))]
    pub async fn requeue_in_flight(&self) -> Result<usize, MessageSourceError> {
        let mut connection = self.connection.clone();
        let mut requeued = 0;

        loop {
            let moved: Option<String> = redis::cmd("RPOPLPUSH")
                .arg(&self.in_flight)
                .arg(&self.queue)
                .query_async(&mut connection)
                .await?;

            if moved.is_none() {
                break;
            }
            requeued += 1;
        }

        if requeued > 0 {
            tracing::info!("Requeued {} unacknowledged messages", requeued);
        }

        Ok(requeued)
    }
}

#[async_trait]
impl MessageSource for RedisMessageSource {
    async fn get_next_message(&self) -> Result<Option<Message>, MessageSourceError> {
        let mut connection = self.connection.clone();

        let body: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(&self.queue)
            .arg(&self.in_flight)
            .query_async(&mut connection)
            .await?;

        Ok(body.map(Message::new))
    }

    #[tracing::instrument(name = "Acknowledge message", skip(self, message))]
    async fn acknowledge(&self, message: &Message) -> Result<(), MessageSourceError> {
        let mut connection = self.connection.clone();

        let removed: i64 = redis::cmd("LREM")
            .arg(&self.in_flight)
            .arg(1)
            .arg(message.body())
            .query_async(&mut connection)
            .await?;

        if removed == 0 {
            tracing::warn!("Acknowledged message was no longer in flight");
        }

        Ok(())
    }
}
