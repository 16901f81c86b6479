use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

/// Keys of cached recommendation data
///
/// Keys carry the feature-store generation they were computed from, so a
/// rebuild makes every older entry unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SimilarTracks {
        track_id: String,
        n: usize,
        generation: u64,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SimilarTracks {
                track_id,
                n,
                generation,
            } => write!(f, "tunewise:similar:g{}:{}:{}", generation, track_id, n),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Pending write handed to the background writer
struct PendingWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis cache with non-blocking writes
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    write_tx: mpsc::UnboundedSender<PendingWrite>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    writer: tokio::task::JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Stops the writer after it has flushed every queued write
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.writer.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and spawns the background writer task
    pub async fn new(redis_client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        let conn = ConnectionManager::new(redis_client).await?;
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer_conn = conn.clone();
        let writer = tokio::spawn(async move {
            Self::writer_task(writer_conn, write_rx, shutdown_rx).await;
        });

        Ok((Self { conn, write_tx }, CacheWriterHandle { shutdown_tx, writer }))
    }

    async fn writer_task(
        mut conn: ConnectionManager,
        mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(write) = write_rx.recv() => {
                    if let Err(e) = Self::write(&mut conn, write).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0;
                    while let Some(write) = write_rx.recv().await {
                        match Self::write(&mut conn, write).await {
                            Ok(()) => flushed += 1,
                            Err(e) => tracing::error!(error = %e, "Failed to flush cache write during shutdown"),
                        }
                    }
                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write(conn: &mut ConnectionManager, write: PendingWrite) -> AppResult<()> {
        let _: () = conn.set_ex(write.key, write.value, write.ttl).await?;
        Ok(())
    }

    /// Reads and deserializes a cached value, `None` on a miss
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let cached: Option<String> = conn.get(key.to_string()).await?;

        match cached {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                tracing::debug!(key = %key, "Cache hit");
                Ok(Some(data))
            }
            None => {
                tracing::debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Queues a value for writing without waiting on Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            value,
            ttl,
        };

        if self.write_tx.send(write).is_err() {
            tracing::error!(key = %key, "Cache writer is gone, dropping write");
        }
    }
}
