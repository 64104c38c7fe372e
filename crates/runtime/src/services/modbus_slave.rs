use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{derive_combined_flag, RunFlag, Service, ServiceSection};
use crate::glue::GlueBinding;
use crate::modbus::server::run_modbus_server;
use crate::modbus::strategy::{AddressSpace, IndexedStrategy, IndexedStrategyConfig};

const RECOGNIZED_KEYS: &[&str] = &[
    "address",
    "port",
    "enabled",
    "coils_start",
    "coils_size",
    "discrete_inputs_start",
    "discrete_inputs_size",
    "holding_registers_start",
    "holding_registers_size",
    "input_registers_start",
    "input_registers_size",
];

pub struct ModbusSlaveService {
    glue: GlueBinding,
    stop: RunFlag,
}

impl ModbusSlaveService {
    pub fn new(glue: GlueBinding) -> Self {
        Self { glue, stop: Arc::new(AtomicBool::new(true)) }
    }
}

/// Reads a `<prefix>_start`/`<prefix>_size` pair out of the section,
/// falling back to `default` field-by-field for missing or unparsable keys.
fn address_space_override(config: &ServiceSection, prefix: &str, default: AddressSpace) -> AddressSpace {
    let start = match config.get(&format!("{prefix}_start")) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key = %format!("{prefix}_start"), value = raw, "not a valid u16, using the default");
            default.start
        }),
        None => default.start,
    };
    let size = match config.get(&format!("{prefix}_size")) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key = %format!("{prefix}_size"), value = raw, "not a valid u16, using the default");
            default.size
        }),
        None => default.size,
    };
    AddressSpace { start, size }
}

#[async_trait]
impl Service for ModbusSlaveService {
    fn name(&self) -> &str {
        "modbusslave"
    }

    async fn start(&self, config: ServiceSection, run: RunFlag) -> anyhow::Result<()> {
        for key in config.keys() {
            if !RECOGNIZED_KEYS.contains(&key.as_str()) {
                warn!(key, "unrecognized modbusslave configuration key, ignoring");
            }
        }

        let address = config.get("address").cloned().unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = config.get("port").and_then(|p| p.parse().ok()).unwrap_or(502);
        let bind_addr: SocketAddr = format!("{address}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid modbusslave bind address {address}:{port}: {e}"))?;

        let default = IndexedStrategyConfig::default();
        let strategy_config = IndexedStrategyConfig {
            coils: address_space_override(&config, "coils", default.coils),
            discrete_inputs: address_space_override(&config, "discrete_inputs", default.discrete_inputs),
            holding_registers: address_space_override(&config, "holding_registers", default.holding_registers),
            input_registers: address_space_override(&config, "input_registers", default.input_registers),
        };

        info!(%bind_addr, "starting modbus slave service");
        let strategy = Arc::new(IndexedStrategy::new(self.glue.clone(), strategy_config));
        let run = derive_combined_flag(run, Arc::clone(&self.stop));
        run_modbus_server(bind_addr, strategy, run).await
    }

    fn request_stop(&self) {
        self.stop.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_space_override_falls_back_on_missing_or_bad_keys() {
        let default = AddressSpace { start: 0, size: 8192 };
        let mut config = ServiceSection::new();
        assert_eq!(address_space_override(&config, "coils", default).size, 8192);

        config.insert("coils_start".to_string(), "100".to_string());
        config.insert("coils_size".to_string(), "not-a-number".to_string());
        let space = address_space_override(&config, "coils", default);
        assert_eq!(space.start, 100);
        assert_eq!(space.size, 8192);
    }
}
