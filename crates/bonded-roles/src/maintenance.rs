//! Background registry maintenance
//!
//! Drives [`BondedRoleRegistry::tick`] and snapshot persistence on fixed
//! intervals until shut down.

use crate::effects::{CancellationToken, Clock, PersistenceStore, ShutdownSignal};
use crate::registry::BondedRoleRegistry;
use bonded_core::BondedError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Periodic tick and persistence driver
pub struct RegistryMaintenance {
    registry: Arc<BondedRoleRegistry>,
    store: Arc<dyn PersistenceStore>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownSignal,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl RegistryMaintenance {
    /// Create a driver; nothing runs until [`RegistryMaintenance::start`]
    pub fn new(
        registry: Arc<BondedRoleRegistry>,
        store: Arc<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            shutdown: ShutdownSignal::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the tick and persistence loops on the current runtime
    pub fn start(&self) {
        let config = self.registry.config();
        tracing::info!(
            tick_interval_ms = config.tick_interval_ms,
            persist_interval_ms = config.persist_interval_ms,
            "Starting registry maintenance"
        );

        let registry = self.registry.clone();
        let clock = self.clock.clone();
        self.spawn_interval(config.tick_interval(), move || {
            let registry = registry.clone();
            let clock = clock.clone();
            async move {
                registry.tick(clock.now());
            }
        });

        let registry = self.registry.clone();
        let store = self.store.clone();
        self.spawn_interval(config.persist_interval(), move || {
            let registry = registry.clone();
            let store = store.clone();
            async move {
                if let Err(err) = persist(&registry, store.as_ref()).await {
                    tracing::warn!(error = %err, "Failed to persist registry snapshot");
                }
            }
        });
    }

    /// Persist a snapshot now; returns the number of entries written
    pub async fn persist_now(&self) -> Result<usize, BondedError> {
        persist(&self.registry, self.store.as_ref()).await
    }

    /// Token cancelled when maintenance shuts down
    pub fn cancellation_token(&self) -> Arc<dyn CancellationToken> {
        self.shutdown.token()
    }

    /// Stop both loops
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    /// Whether shutdown was requested
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run `f` every `interval` until shutdown; a failing run is logged by
    /// `f` and the loop carries on
    fn spawn_interval<F, Fut>(&self, interval: Duration, mut f: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if *shutdown_rx.borrow() {
                    break;
                }
                f().await;
            }
        });
        self.handles.lock().push(handle);
    }
}

impl Drop for RegistryMaintenance {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn persist(
    registry: &BondedRoleRegistry,
    store: &dyn PersistenceStore,
) -> Result<usize, BondedError> {
    let snapshot = registry.snapshot();
    let entries = snapshot.len();
    store.save(&snapshot).await?;
    tracing::debug!(entries, "Persisted registry snapshot");
    Ok(entries)
}
