//! Postgres notification feed.
//!
//! Each subscription owns a dedicated connection. A driver task polls the
//! connection for asynchronous messages and forwards notifications into a
//! channel the subscription reads from. Dropping the subscription aborts
//! the driver, which closes the connection.

use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, Config, NoTls};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::traits::{Notification, NotificationFeed, Subscription};

const DEFAULT_BUFFER: usize = 1024;

/// Notification feed backed by Postgres `LISTEN`.
#[derive(Clone)]
pub struct PostgresFeed {
    config: Config,
    buffer: usize,
}

impl PostgresFeed {
    /// Create a feed for the database at `db_url`.
    ///
    /// Accepts both URL (`postgres://...`) and key/value connection strings.
    /// No connection is made until [`subscribe`](NotificationFeed::subscribe)
    /// or [`ping`](NotificationFeed::ping).
    pub fn new(db_url: &str) -> Result<Self> {
        let mut config: Config = db_url
            .parse()
            .map_err(|e: tokio_postgres::Error| StoreError::Config(e.to_string()))?;
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(Duration::from_secs(10));
        }
        Ok(Self {
            config,
            buffer: DEFAULT_BUFFER,
        })
    }

    /// Set how many notifications may queue before the driver waits.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    async fn connect(&self) -> Result<(Client, mpsc::Receiver<Result<Notification>>, JoinHandle<()>)> {
        let (client, mut connection) = self.config.connect(NoTls).await?;
        let (tx, rx) = mpsc::channel(self.buffer);

        let driver = tokio::spawn(async move {
            let mut messages = stream::poll_fn(move |cx| connection.poll_message(cx));
            while let Some(message) = messages.next().await {
                match message {
                    Ok(AsyncMessage::Notification(n)) => {
                        let notification = Notification {
                            channel: n.channel().to_string(),
                            payload: n.payload().to_string(),
                        };
                        if tx.send(Ok(notification)).await.is_err() {
                            break;
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        debug!(notice = %notice, "postgres notice");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "notification connection failed");
                        let _ = tx.send(Err(StoreError::Database(e))).await;
                        break;
                    }
                }
            }
            debug!("notification driver exited");
        });

        Ok((client, rx, driver))
    }
}

#[async_trait]
impl NotificationFeed for PostgresFeed {
    async fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>> {
        let statement = format!("LISTEN {}", quote_channel(channel)?);
        let (client, receiver, driver) = self.connect().await?;

        if let Err(e) = client.batch_execute(&statement).await {
            driver.abort();
            return Err(e.into());
        }

        info!(channel, "listening for notifications");
        Ok(Box::new(PostgresSubscription {
            _client: client,
            receiver,
            driver,
        }))
    }

    async fn ping(&self) -> Result<()> {
        let (client, _receiver, driver) = self.connect().await?;
        let result = client.batch_execute("SELECT 1").await;
        driver.abort();
        result.map_err(Into::into)
    }
}

/// A live `LISTEN` on one channel.
pub struct PostgresSubscription {
    // Held so the connection stays open.
    _client: Client,
    receiver: mpsc::Receiver<Result<Notification>>,
    driver: JoinHandle<()>,
}

#[async_trait]
impl Subscription for PostgresSubscription {
    async fn next_notification(&mut self) -> Option<Result<Notification>> {
        self.receiver.recv().await
    }
}

impl Drop for PostgresSubscription {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Quote a channel name as a SQL identifier.
fn quote_channel(channel: &str) -> Result<String> {
    if channel.is_empty() || channel.contains('\0') {
        return Err(StoreError::InvalidChannel(channel.to_string()));
    }
    Ok(format!("\"{}\"", channel.replace('"', "\"\"")))
}
