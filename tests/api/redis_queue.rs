use uuid::Uuid;

use mailsling::config::get_configuration;
use mailsling::message_source::{MessageSource, RedisMessageSource};

async fn spawn_queue() -> (RedisMessageSource, redis::aio::MultiplexedConnection, String) {
    let mut config = get_configuration().expect("Missing configuration file.");
    let queue_name = format!("mailsling:test:{}", Uuid::new_v4());
    config.set_queue_name(queue_name.clone());

    let source = RedisMessageSource::connect(&config.queue)
        .await
        .expect("Failed to connect to Redis.");
    let connection = redis::Client::open(config.queue.get_address())
        .expect("Invalid Redis address.")
        .get_multiplexed_tokio_connection()
        .await
        .expect("Failed to connect to Redis.");

    (source, connection, queue_name)
}

#[tokio::test]
#[ignore = "requires a running Redis instance"]
async fn unacknowledged_messages_are_redelivered_after_requeue() {
    let (source, mut connection, queue_name) = spawn_queue().await;
    for body in ["first", "second"] {
        let _: i64 = redis::cmd("LPUSH")
            .arg(&queue_name)
            .arg(body)
            .query_async(&mut connection)
            .await
            .unwrap();
    }

    let first = source.get_next_message().await.unwrap().unwrap();
    let second = source.get_next_message().await.unwrap().unwrap();
    assert_eq!(first.body(), "first");
    assert_eq!(second.body(), "second");
    assert!(source.get_next_message().await.unwrap().is_none());

    source.acknowledge(&first).await.unwrap();
    assert_eq!(source.requeue_in_flight().await.unwrap(), 1);

    let redelivered = source.get_next_message().await.unwrap().unwrap();
    assert_eq!(redelivered.body(), "second");
    source.acknowledge(&redelivered).await.unwrap();
    assert_eq!(source.requeue_in_flight().await.unwrap(), 0);
    assert!(source.get_next_message().await.unwrap().is_none());
}
