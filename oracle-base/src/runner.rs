use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use oracle_core::{OracleStore, RunnerServiceStatus};

use crate::settings::ServiceConfig;

/// One unit of periodic work: a monitor, signer or relayer.
#[async_trait]
pub trait Runnable: Send + Sync + Debug {
    /// Do one tick of work. Failures are logged and retried next tick.
    async fn run(&mut self);

    /// Block height the runnable has reached
    fn height(&self) -> u64;
}

/// Stands in for a runner that is disabled in the settings.
#[derive(Debug, Default)]
pub struct EmptyRunnable;

#[async_trait]
impl Runnable for EmptyRunnable {
    async fn run(&mut self) {}

    fn height(&self) -> u64 {
        0
    }
}

/// Latest status of a runner, readable while it runs.
#[derive(Debug, Clone, Default)]
pub struct RunnerStatusReader(Arc<RwLock<Option<RunnerServiceStatus>>>);

impl RunnerStatusReader {
    /// `None` when the runner is disabled or has not finished a tick.
    pub fn get(&self) -> Option<RunnerServiceStatus> {
        self.0.read().clone()
    }
}

/// Calls a [`Runnable`] on a fixed interval until shut down, persisting its
/// status after every tick.
#[derive(Debug)]
pub struct RunnerService {
    name: String,
    runnable: Box<dyn Runnable>,
    config: ServiceConfig,
    store: Arc<dyn OracleStore>,
    status: RunnerStatusReader,
    shutdown: watch::Receiver<bool>,
}

impl RunnerService {
    /// Schedule `runnable` under `name`.
    pub fn new(
        name: impl Into<String>,
        runnable: Box<dyn Runnable>,
        config: ServiceConfig,
        store: Arc<dyn OracleStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            name: name.into(),
            runnable,
            config,
            store,
            status: RunnerStatusReader::default(),
            shutdown,
        }
    }

    /// Runner name, also the key of its persisted status
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the latest status
    pub fn status_reader(&self) -> RunnerStatusReader {
        self.status.clone()
    }

    /// Latest status, `None` when disabled
    pub fn status(&self) -> Option<RunnerServiceStatus> {
        self.status.get()
    }

    /// Tick until the shutdown signal fires. Returns at once when disabled.
    pub async fn start(mut self) {
        if !self.config.enabled {
            info!(runner = %self.name, "Runner disabled");
            return;
        }
        info!(runner = %self.name, interval_ms = self.config.interval_ms, "Starting runner");
        let interval = self.config.interval();
        while !*self.shutdown.borrow() {
            self.tick(interval).await;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // sender gone, nobody can stop us any more
                        break;
                    }
                }
            }
        }
        info!(runner = %self.name, "Runner stopped");
    }

    async fn tick(&mut self, interval: Duration) {
        self.runnable.run().await;

        let now = Utc::now();
        let status = RunnerServiceStatus {
            name: self.name.clone(),
            enabled: true,
            block_height: self.runnable.height(),
            last_run_at: now,
            next_run_at: now + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero()),
        };
        debug!(runner = %self.name, block_height = status.block_height, "Tick finished");
        *self.status.0.write() = Some(status.clone());
        if let Err(err) = self.store.upsert_runner_status(status).await {
            warn!(runner = %self.name, ?err, "Failed to persist runner status");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::InMemoryStore;

    use super::*;

    #[derive(Debug, Default)]
    struct Counter(Arc<AtomicU64>);

    #[async_trait]
    impl Runnable for Counter {
        async fn run(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn height(&self) -> u64 {
            self.0.load(Ordering::SeqCst) * 10
        }
    }

    fn config(enabled: bool) -> ServiceConfig {
        ServiceConfig {
            enabled,
            interval_ms: 1_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_runner_never_ticks() {
        let store = Arc::new(InMemoryStore::default());
        let (_tx, rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let service = RunnerService::new(
            "disabled",
            Box::new(Counter(ticks.clone())),
            config(false),
            store.clone(),
            rx,
        );
        let reader = service.status_reader();
        service.start().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(reader.get().is_none());
        assert!(store.get_runner_status("disabled").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn runner_ticks_and_persists_until_shutdown() {
        let store = Arc::new(InMemoryStore::default());
        let (tx, rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));
        let service = RunnerService::new(
            "sepolia-monitor",
            Box::new(Counter(ticks.clone())),
            config(true),
            store.clone(),
            rx,
        );
        let reader = service.status_reader();
        let handle = tokio::spawn(service.start());

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let count = ticks.load(Ordering::SeqCst);
        assert!(count >= 2, "ticked {count} times");
        let status = reader.get().unwrap();
        assert_eq!(status.block_height, count * 10);
        assert!(status.next_run_at > status.last_run_at);
        let persisted = store.get_runner_status("sepolia-monitor").await.unwrap().unwrap();
        assert_eq!(persisted, status);
    }
}
