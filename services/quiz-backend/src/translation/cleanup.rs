//! 过期翻译缓存的定时清理

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::cache::TranslationCacheRepository;

pub struct CacheCleanupTask {
    cache: Arc<dyn TranslationCacheRepository>,
    interval: Duration,
}

impl CacheCleanupTask {
    pub fn new(cache: Arc<dyn TranslationCacheRepository>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Translation cache cleanup task started");
            let mut ticker = interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.cache.delete_expired().await {
                            Ok(deleted) => info!(deleted, "Translation cache cleanup finished"),
                            Err(e) => error!(error = %e, "Failed to clean up translation cache"),
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("Translation cache cleanup received shutdown signal");
                        break;
                    }
                }
            }
            info!("Translation cache cleanup task stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::cache::MockTranslationCacheRepository;

    #[tokio::test]
    async fn test_runs_immediately_and_stops_on_shutdown() {
        let mut cache = MockTranslationCacheRepository::new();
        cache.expect_delete_expired().times(1..).returning(|| Ok(3));

        let task = Arc::new(CacheCleanupTask::new(Arc::new(cache), Duration::from_secs(3600)));
        let shutdown = CancellationToken::new();
        let handle = task.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
