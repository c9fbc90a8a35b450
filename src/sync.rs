use std::sync::{Arc, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::index::AvailabilityIndex;
use crate::store::BookingStore;

/// Spawn [`run_sync`] on the current runtime.
pub fn spawn_sync(index: Arc<AvailabilityIndex>, store: Arc<dyn BookingStore>) -> JoinHandle<()> {
    tokio::spawn(async move { run_sync(index, store).await })
}

/// Keep `index` in step with `store`: one initial full load, then a rebuild
/// per pushed collection. Only a weak handle to the store is kept, so the loop
/// returns once every other owner drops it and its change channel closes.
pub async fn run_sync(index: Arc<AvailabilityIndex>, store: Arc<dyn BookingStore>) {
    // Subscribe before the initial read so no change falls in between.
    let mut rx = store.subscribe();
    refetch(&index, store.as_ref()).await;
    let store = {
        let weak: Weak<dyn BookingStore> = Arc::downgrade(&store);
        drop(store);
        weak
    };
    info!("booking sync started");

    loop {
        match rx.recv().await {
            Ok(set) => index.rebuild(set.as_ref().clone()).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!("booking sync lagged, {skipped} pushes skipped; refetching");
                metrics::counter!(crate::observability::SYNC_LAGGED_TOTAL).increment(skipped);
                let Some(store) = store.upgrade() else { break };
                refetch(&index, store.as_ref()).await;
            }
            Err(RecvError::Closed) => break,
        }
    }
    info!("booking store dropped, sync stopped");
}
