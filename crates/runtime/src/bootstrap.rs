//! The fixed startup sequence: parse config, initialize the program and
//! glue, initialize hardware, register services, start the enabled ones,
//! then hand the calling thread to the scan engine until shutdown.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{self, RuntimeConfig};
use crate::custom::{CustomLayer, NoopCustomLayer};
use crate::glue::GlueBinding;
use crate::hardware::{HardwareLayer, SimulatorHardware};
use crate::program::{ControlProgram, EchoProgram};
use crate::scan::ScanEngine;
use crate::services::external_stub::ExternalStubService;
use crate::services::interactive::InteractiveService;
use crate::services::modbus_slave::ModbusSlaveService;
use crate::services::{RunFlag, ServiceRegistry};

pub const KNOWN_SERVICES: &[&str] = &["interactive", "modbusslave", "modbusmaster"];

/// Step 1 of the bootstrap sequence, split out so `main` can apply the
/// configured logging level before installing the (non-reloadable) global
/// tracing subscriber.
pub fn load_config() -> RuntimeConfig {
    config::load(&config::config_path(), KNOWN_SERVICES)
}

pub async fn run(run: RunFlag, runtime_config: RuntimeConfig) -> anyhow::Result<()> {
    if let Some(level) = runtime_config.log_level {
        debug!(level = level.as_filter(), "configuration's logging level was applied before the tracing subscriber was installed");
    }

    let mut program = EchoProgram::new();
    let glue = GlueBinding::new(program.common_tick_time_ns());
    glue.with_locked(|image| program.config_init(image)).await;

    let hardware: Arc<dyn HardwareLayer> = Arc::new(SimulatorHardware::new());
    hardware.initialize()?;

    let custom: Arc<dyn CustomLayer> = Arc::new(NoopCustomLayer);
    custom.init();

    glue.with_locked(|image| {
        hardware.sample_inputs(image);
        hardware.commit_outputs(image);
    })
    .await;

    let mut registry = ServiceRegistry::new();
    registry.register(Arc::new(InteractiveService::new()));
    registry.register(Arc::new(ModbusSlaveService::new(glue.clone())));
    registry.register(Arc::new(ExternalStubService::new("modbusmaster")));

    for service in registry.iter() {
        if let Err(e) = service.pre_start() {
            warn!(service = service.name(), error = %e, "service failed to pre-start");
        }
    }

    let mut handles = Vec::new();
    for name in &runtime_config.enabled_services {
        let Some(service) = registry.find(name) else {
            warn!(service = name, "enabled service is not registered, skipping");
            continue;
        };
        let section = runtime_config.sections.get(name).cloned().unwrap_or_default();
        let service_run = Arc::clone(&run);
        let service_name = name.clone();
        info!(service = service_name, "starting service");
        handles.push(tokio::spawn(async move {
            if let Err(e) = service.start(section, service_run).await {
                tracing::error!(service = service_name, error = %e, "service exited with an error");
            }
        }));
    }

    let scan_run = Arc::clone(&run);
    let scan_glue = glue.clone();
    let scan_hardware = Arc::clone(&hardware);
    let scan_custom = Arc::clone(&custom);
    let scan_handle = std::thread::spawn(move || {
        let mut engine = ScanEngine::new(scan_glue, scan_hardware, scan_custom, program);
        engine.run(scan_run);
    });

    scan_handle.join().map_err(|_| anyhow::anyhow!("scan engine thread panicked"))?;
    run.store(false, Ordering::Relaxed);

    for handle in handles {
        let _ = handle.await;
    }

    hardware.finalize();
    Ok(())
}
