//! Redis Streams implementation of the click topic.
//!
//! Each click is one stream entry with two fields, `key` (the ad id) and
//! `value` (the JSON event). Workers read through a consumer group so that
//! several instances share the stream without group-wide duplicates.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamMaxlen, StreamReadOptions,
    StreamReadReply,
};
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use tracing::{debug, info};

use super::service::{BrokerError, BrokerMessage, BrokerResult, EventPublisher, EventSubscriber};

const FIELD_KEY: &str = "key";
const FIELD_VALUE: &str = "value";

/// Stream and consumer-group names.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    /// Approximate stream length cap applied on every publish.
    pub max_len: usize,
}

#[derive(Clone)]
pub struct RedisStreamBroker {
    conn: ConnectionManager,
    settings: StreamSettings,
    timeout: Duration,
}

impl RedisStreamBroker {
    /// Connects to the broker and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConnectionError`] if the connection cannot be established.
    pub async fn connect(
        url: &str,
        settings: StreamSettings,
        timeout: Duration,
    ) -> BrokerResult<Self> {
        info!(stream = %settings.stream, group = %settings.group, "Connecting to event broker");

        let client = Client::open(url).map_err(|e| {
            BrokerError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;
        let manager = ConnectionManager::new(client).await.map_err(|e| {
            BrokerError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| BrokerError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("✓ Connected to event broker");

        Ok(Self {
            conn: manager,
            settings,
            timeout,
        })
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> BrokerResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        with_timeout(self.timeout, op, fut).await
    }
}

async fn with_timeout<T, F>(limit: Duration, op: &'static str, fut: F) -> BrokerResult<T>
where
    F: Future<Output = RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BrokerError::OperationError(format!("{op}: {e}"))),
        Err(_) => Err(BrokerError::Timeout(op)),
    }
}

/// `Ok(true)` if the group was created, `Ok(false)` if it already existed.
async fn create_group<F>(fut: F) -> RedisResult<bool>
where
    F: Future<Output = RedisResult<()>>,
{
    match fut.await {
        Ok(()) => Ok(true),
        Err(e) if e.to_string().contains("BUSYGROUP") => Ok(false),
        Err(e) => Err(e),
    }
}

/// Entries missing a field still become messages; the consumer rejects
/// the empty payload and acknowledges it so it is not redelivered forever.
fn to_message(entry: StreamId) -> BrokerMessage {
    BrokerMessage {
        key: entry.get::<String>(FIELD_KEY).unwrap_or_default(),
        payload: entry.get::<String>(FIELD_VALUE).unwrap_or_default(),
        id: entry.id,
    }
}

#[async_trait]
impl EventPublisher for RedisStreamBroker {
    async fn publish(&self, key: &str, payload: &str) -> BrokerResult<String> {
        let mut conn = self.conn.clone();
        let stream = self.settings.stream.clone();
        let max_len = self.settings.max_len;
        let items = [(FIELD_KEY, key), (FIELD_VALUE, payload)];

        let id: String = self
            .run("XADD", async move {
                conn.xadd_maxlen(&stream, StreamMaxlen::Approx(max_len), "*", &items)
                    .await
            })
            .await?;

        debug!(id = %id, key, "Published click event");
        Ok(id)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        self.run("PING", async move { conn.ping::<()>().await })
            .await
            .is_ok()
    }
}

#[async_trait]
impl EventSubscriber for RedisStreamBroker {
    async fn ensure_group(&self) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let stream = self.settings.stream.clone();
        let group = self.settings.group.clone();

        let created = self
            .run(
                "XGROUP CREATE",
                create_group(conn.xgroup_create_mkstream(&stream, &group, "0")),
            )
            .await?;

        if created {
            info!(group = %self.settings.group, "Created consumer group");
        } else {
            info!(group = %self.settings.group, "Consumer group already exists");
        }
        Ok(())
    }

    async fn poll(&self, max: usize) -> BrokerResult<Vec<BrokerMessage>> {
        let mut conn = self.conn.clone();
        let stream = self.settings.stream.clone();
        let opts = StreamReadOptions::default()
            .group(&self.settings.group, &self.settings.consumer)
            .count(max);

        let reply: StreamReadReply = self
            .run("XREADGROUP", async move {
                conn.xread_options(&[&stream], &[">"], &opts).await
            })
            .await?;

        Ok(reply
            .keys
            .into_iter()
            .flat_map(|stream_key| stream_key.ids)
            .map(to_message)
            .collect())
    }

    async fn claim_stale(&self, min_idle: Duration, max: usize) -> BrokerResult<Vec<BrokerMessage>> {
        let mut conn = self.conn.clone();
        let stream = self.settings.stream.clone();
        let group = self.settings.group.clone();
        let consumer = self.settings.consumer.clone();
        let min_idle_ms = min_idle.as_millis() as u64;
        let opts = StreamAutoClaimOptions::default().count(max);

        let reply: StreamAutoClaimReply = self
            .run("XAUTOCLAIM", async move {
                conn.xautoclaim_options(&stream, &group, &consumer, min_idle_ms, "0-0", opts)
                    .await
            })
            .await?;

        if !reply.claimed.is_empty() {
            info!(count = reply.claimed.len(), "Claimed pending click messages");
        }

        Ok(reply.claimed.into_iter().map(to_message).collect())
    }

    async fn ack(&self, ids: &[String]) -> BrokerResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let stream = self.settings.stream.clone();
        let group = self.settings.group.clone();
        let ids = ids.to_vec();

        let acked: i64 = self
            .run("XACK", async move { conn.xack(&stream, &group, &ids).await })
            .await?;

        debug!(acked, "Acknowledged click messages");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ErrorKind, RedisError};

    #[tokio::test(start_paused = true)]
    async fn test_stalled_group_create_times_out() {
        let result = with_timeout(
            Duration::from_millis(100),
            "XGROUP CREATE",
            create_group(std::future::pending()),
        )
        .await;

        assert!(matches!(result, Err(BrokerError::Timeout("XGROUP CREATE"))));
    }

    #[tokio::test]
    async fn test_existing_group_is_not_an_error() {
        let busy = RedisError::from((
            ErrorKind::Extension,
            "BUSYGROUP",
            "Consumer Group name already exists".to_string(),
        ));

        let created = create_group(async { Err(busy) }).await.unwrap();
        assert!(!created);
        assert!(create_group(async { Ok(()) }).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_group_errors_propagate() {
        let wrong_type = RedisError::from((
            ErrorKind::Extension,
            "WRONGTYPE",
            "Key holds the wrong kind of value".to_string(),
        ));

        let result = with_timeout(
            Duration::from_secs(1),
            "XGROUP CREATE",
            create_group(async { Err(wrong_type) }),
        )
        .await;

        match result {
            Err(BrokerError::OperationError(msg)) => assert!(msg.starts_with("XGROUP CREATE")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
