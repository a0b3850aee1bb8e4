//! Available-RAM probe, abstracted so the Dispatcher's RAM gate (§4.7.4)
//! doesn't depend on a concrete platform API (§4.3).

use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;

#[async_trait]
pub trait ResourceMonitor: Send + Sync {
    async fn available_ram_gb(&self) -> f64;
}

/// Default implementation backed by `sysinfo`. Any probe failure - the
/// underlying refresh panicking on an unsupported platform, or reporting
/// nonsensical values - collapses to `0.0`, the safe lower bound that
/// forces the RAM gate's eviction path (§4.3).
pub struct SysinfoResourceMonitor {
    system: Mutex<System>,
}

impl Default for SysinfoResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoResourceMonitor {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

#[async_trait]
impl ResourceMonitor for SysinfoResourceMonitor {
    async fn available_ram_gb(&self) -> f64 {
        let mut system = self.system.lock().await;
        let available_bytes =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                system.refresh_memory();
                system.available_memory()
            }))
            .unwrap_or(0);
        available_bytes as f64 / 1024f64.powi(3)
    }
}
