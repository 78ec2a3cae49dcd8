//! RedisQueueStore - lists for queues, keyspace notifications for arrivals.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, IntoConnectionInfo, Msg, RedisError};
use tracing::{debug, info, warn};

use dispenser_core::config::StoreSettings;
use dispenser_core::domain::{QueueName, StoreEvent};
use dispenser_core::ports::{QueueStore, StoreError, Subscription};

use crate::keyspace::{KeyspaceChannel, merge_notify_flags};

const NOTIFY_KEYSPACE_EVENTS: &str = "notify-keyspace-events";

fn store_error(err: RedisError) -> StoreError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Command(err.to_string())
    }
}

/// Queue store over one multiplexed Redis connection.
///
/// Every clone shares that connection; subscriptions open their own.
#[derive(Clone)]
pub struct RedisQueueStore {
    client: Client,
    conn: MultiplexedConnection,
    keyspace: KeyspaceChannel,
}

impl RedisQueueStore {
    /// Connect and check the server answers.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let mut info = format!("redis://{}:{}/", settings.host, settings.port)
            .into_connection_info()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        info.redis.db = settings.db;
        info.redis.password = settings.password.clone();

        let client = Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        debug!(host = %settings.host, port = settings.port, db = settings.db, %pong, "Connected to Redis");

        Ok(Self {
            client,
            conn,
            keyspace: KeyspaceChannel::new(settings.db),
        })
    }

    /// Make sure list operations publish keyspace notifications.
    async fn enable_notifications(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let current: Vec<String> = redis::cmd("CONFIG")
            .arg("GET")
            .arg(NOTIFY_KEYSPACE_EVENTS)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        let current = current.get(1).map(String::as_str).unwrap_or_default();

        if let Some(flags) = merge_notify_flags(current) {
            let () = redis::cmd("CONFIG")
                .arg("SET")
                .arg(NOTIFY_KEYSPACE_EVENTS)
                .arg(&flags)
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
            info!(from = current, to = %flags, "Enabled keyspace notifications");
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn push(&self, queue: &QueueName, value: String) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        conn.lpush(queue.as_str(), value).await.map_err(store_error)
    }

    async fn pop_oldest(&self, queue: &QueueName, n: usize) -> Result<Vec<String>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let n = i64::try_from(n).map_err(|_| StoreError::Command(format!("batch of {n} is too large")))?;
        let mut conn = self.conn.clone();

        // MULTI/EXEC: nothing can slip between the read and the trim
        let (mut entries,): (Vec<String>,) = redis::pipe()
            .atomic()
            .cmd("LRANGE")
            .arg(queue.as_str())
            .arg(-n)
            .arg(-1)
            .cmd("LTRIM")
            .arg(queue.as_str())
            .arg(0)
            .arg(-n - 1)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;

        // tail is oldest
        entries.reverse();
        Ok(entries)
    }

    async fn length(&self, queue: &QueueName) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        conn.llen(queue.as_str()).await.map_err(store_error)
    }

    async fn subscribe(&self, queues: &[QueueName]) -> Result<Box<dyn Subscription>, StoreError> {
        self.enable_notifications().await?;

        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        for queue in queues {
            pubsub
                .subscribe(self.keyspace.channel_for(queue))
                .await
                .map_err(store_error)?;
        }

        Ok(Box::new(RedisSubscription {
            messages: pubsub.into_on_message().boxed(),
            keyspace: self.keyspace.clone(),
        }))
    }
}

pub struct RedisSubscription {
    messages: BoxStream<'static, Msg>,
    keyspace: KeyspaceChannel,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn next_event(&mut self) -> Result<StoreEvent, StoreError> {
        loop {
            let msg = self.messages.next().await.ok_or(StoreError::SubscriptionClosed)?;
            let op: String = match msg.get_payload() {
                Ok(op) => op,
                Err(e) => {
                    warn!(channel = msg.get_channel_name(), error = %e, "Unreadable notification");
                    continue;
                }
            };
            match self.keyspace.event(msg.get_channel_name(), &op) {
                Some(event) => return Ok(event),
                None => debug!(channel = msg.get_channel_name(), "Skip foreign channel"),
            }
        }
    }
}
