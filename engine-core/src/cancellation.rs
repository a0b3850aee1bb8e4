//! Process-wide request id -> cancel handle map (§4.8).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use engine_common::RequestId;
use tokio::sync::RwLock;

/// Shared cancel flag for one in-flight request. Cheap to clone; every
/// clone observes the same underlying flag.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `register`/`cancel`/`unregister`/`cleanup`, all idempotent per
/// §4.8: cancelling an unknown id returns `false`, double-unregister is a
/// no-op. Handles are dropped (their `Arc` count decremented) on
/// unregister - this registry holds the only strong reference a request's
/// cancel flag needs beyond the task itself.
#[derive(Default)]
pub struct CancellationRegistry {
    handles: RwLock<HashMap<RequestId, CancelHandle>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: RequestId, handle: CancelHandle) {
        self.handles.write().await.insert(id, handle);
    }

    pub async fn cancel(&self, id: &RequestId) -> bool {
        match self.handles.read().await.get(id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn unregister(&self, id: &RequestId) {
        self.handles.write().await.remove(id);
    }

    pub async fn contains(&self, id: &RequestId) -> bool {
        self.handles.read().await.contains_key(id)
    }

    pub async fn cleanup(&self) {
        self.handles.write().await.clear();
    }
}
