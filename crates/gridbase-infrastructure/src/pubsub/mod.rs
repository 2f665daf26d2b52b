//! Cross-instance Pub/Sub Broker (C9, spec §4.9) over Redis, the wire
//! path the collaboration server subscribes to for ShareDB op fanout.
//! Distinct from [`crate::events`], which never leaves this process.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client};

use gridbase_domain::error::{Error, Result};
use gridbase_domain::ports::{PubSubBroker, PubSubSubscription};

pub struct RedisPubSubBroker {
    client: Client,
    publish_conn: ConnectionManager,
}

impl RedisPubSubBroker {
    /// Open a client and a multiplexed connection for publishing.
    /// Subscriptions get their own dedicated connection per call, since
    /// Redis pub/sub connections cannot issue other commands.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|err| Error::Transport {
            message: format!("invalid redis url: {err}"),
        })?;
        let publish_conn = client.get_connection_manager().await.map_err(|err| Error::Transport {
            message: format!("failed to open redis connection: {err}"),
        })?;
        Ok(Self { client, publish_conn })
    }
}

#[async_trait]
impl PubSubBroker for RedisPubSubBroker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.publish_conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await.map_err(|err| Error::Transport {
            message: format!("redis publish failed: {err}"),
        })
    }

    async fn subscribe(&self, channel: &str) -> Result<Box<dyn PubSubSubscription>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|err| Error::Transport {
            message: format!("failed to open redis pubsub connection: {err}"),
        })?;
        pubsub.subscribe(channel).await.map_err(|err| Error::Transport {
            message: format!("redis subscribe failed: {err}"),
        })?;
        Ok(Box::new(RedisSubscription { pubsub: Some(pubsub) }))
    }
}

struct RedisSubscription {
    pubsub: Option<PubSub>,
}

#[async_trait]
impl PubSubSubscription for RedisSubscription {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(pubsub) = self.pubsub.as_mut() else {
            return Ok(None);
        };
        match pubsub.on_message().next().await {
            Some(msg) => Ok(Some(msg.get_payload_bytes().to_vec())),
            None => Ok(None),
        }
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.pubsub = None;
        Ok(())
    }
}
