//! Emits service state transitions (§4.7.5). Wraps a `watch::Sender` for
//! "latest value" semantics - unlike a runner-connect/disconnect event log,
//! which would warrant `broadcast`, `ServiceState` only ever has one current
//! value, so `watch` is the idiomatic fit.

use std::sync::RwLock;

use engine_common::{ServiceState, StatusSink};
use tokio::sync::watch;

pub struct StatusPublisher {
    sender: watch::Sender<ServiceState>,
    sinks: RwLock<Vec<Box<dyn StatusSink>>>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ServiceState::Ready);
        Self {
            sender,
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Lets a host bridge `ServiceState` transitions into its own
    /// notification layer without the core depending on it (§6).
    pub fn add_sink(&self, sink: Box<dyn StatusSink>) {
        self.sinks.write().unwrap().push(sink);
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> ServiceState {
        self.sender.borrow().clone()
    }

    /// Idempotent per-state (§6): publishing the same state twice is
    /// harmless, sinks/subscribers just observe it twice.
    pub fn publish(&self, state: ServiceState) {
        let _ = self.sender.send(state.clone());
        for sink in self.sinks.read().unwrap().iter() {
            sink.on_state(state.clone());
        }
    }
}
