//! Service registry: named, independently startable background activities
//! (interactive console, Modbus slave, and stubs for external
//! collaborators this runtime doesn't implement itself).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub type ServiceSection = HashMap<String, String>;
pub type RunFlag = Arc<AtomicBool>;

#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Called once for every registered service, before any service starts.
    fn pre_start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs until `run` clears. Expected to observe the flag cooperatively
    /// rather than block forever.
    async fn start(&self, config: ServiceSection, run: RunFlag) -> anyhow::Result<()>;

    /// Signals this service's own run loop to exit, independent of the
    /// process-wide run flag passed to `start`. Gives the registry a way to
    /// stop one service without tearing down every other one.
    fn request_stop(&self);
}

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Merges the process-wide run flag with a service's own stop signal into a
/// single derived flag, so a service's existing single-flag loop (the
/// Modbus accept loop, the interactive console's stdin loop) observes
/// either without threading two parameters all the way down.
pub fn derive_combined_flag(global: RunFlag, own: RunFlag) -> RunFlag {
    let derived: RunFlag = Arc::new(AtomicBool::new(true));
    let watched = Arc::clone(&derived);
    tokio::spawn(async move {
        while global.load(Ordering::Relaxed) && own.load(Ordering::Relaxed) {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
        watched.store(false, Ordering::Relaxed);
    });
    derived
}

/// All services known to this process. Populated once at startup and
/// read-only from then on.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self { services: Vec::new() }
    }

    pub fn register(&mut self, service: Arc<dyn Service>) {
        self.services.push(service);
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.iter().find(|s| s.name() == name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Service>> {
        self.services.iter()
    }
}

pub mod external_stub;
pub mod interactive;
pub mod modbus_slave;
