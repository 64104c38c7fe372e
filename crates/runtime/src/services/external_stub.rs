use async_trait::async_trait;
use tracing::warn;

use super::{RunFlag, Service, ServiceSection};

/// Satisfies the [`Service`] contract for a collaborator this runtime does
/// not implement itself (the Modbus master client, `modbusmaster`). Logs
/// once and returns; the real implementation lives outside this repo.
pub struct ExternalStubService {
    name: String,
}

impl ExternalStubService {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Service for ExternalStubService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _config: ServiceSection, _run: RunFlag) -> anyhow::Result<()> {
        warn!(service = %self.name, "no implementation registered for this service, treating it as an external collaborator");
        Ok(())
    }

    /// `start` already returns immediately; there is no loop to signal.
    fn request_stop(&self) {}
}
