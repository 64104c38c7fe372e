//! Maps Modbus address spaces onto the I/O image. Every operation acquires
//! the buffer lock for its duration; none of them hold it across calls.

use crate::error::ModbusException;
use crate::glue::image::{BoolArray, WordArray};
use crate::glue::GlueBinding;

use super::wire::{high_byte, low_byte, to_word};

#[derive(Debug, Clone, Copy)]
pub struct AddressSpace {
    pub start: u16,
    pub size: u16,
}

impl AddressSpace {
    fn relative_range(&self, start: u16, count: u16) -> Option<std::ops::Range<usize>> {
        let rel_start = start.checked_sub(self.start)?;
        let rel_end = rel_start.checked_add(count)?;
        if rel_end > self.size {
            return None;
        }
        Some(rel_start as usize..rel_end as usize)
    }
}

/// Default address-space sizes, matching the original's defaults: 8192
/// coils, 8192 discrete inputs, 8192 holding registers, 1024 input
/// registers.
#[derive(Debug, Clone, Copy)]
pub struct IndexedStrategyConfig {
    pub coils: AddressSpace,
    pub discrete_inputs: AddressSpace,
    pub holding_registers: AddressSpace,
    pub input_registers: AddressSpace,
}

impl Default for IndexedStrategyConfig {
    fn default() -> Self {
        Self {
            coils: AddressSpace { start: 0, size: 8192 },
            discrete_inputs: AddressSpace { start: 0, size: 8192 },
            holding_registers: AddressSpace { start: 0, size: 8192 },
            input_registers: AddressSpace { start: 0, size: 1024 },
        }
    }
}

/// Indexed view over a [`GlueBinding`] exposing the four Modbus address
/// spaces: coils and discrete inputs 1:1 against the bool arrays, holding
/// registers walking the `int_output`/memory fallback chain, input
/// registers 1:1 against `int_input`.
pub struct IndexedStrategy {
    glue: GlueBinding,
    config: IndexedStrategyConfig,
}

impl IndexedStrategy {
    pub fn new(glue: GlueBinding, config: IndexedStrategyConfig) -> Self {
        Self { glue, config }
    }

    pub async fn read_coils(&self, start: u16, count: u16, out: &mut [u8]) -> Result<(), ModbusException> {
        let range = self.config.coils.relative_range(start, count).ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let bit = image
                        .bool_at(BoolArray::Output, addr / 8, addr % 8)
                        .map_err(|_| ModbusException::IllegalDataAddress)?;
                    if bit {
                        out[i / 8] |= 1 << (i % 8);
                    }
                }
                Ok(())
            })
            .await
    }

    pub async fn read_discrete_inputs(&self, start: u16, count: u16, out: &mut [u8]) -> Result<(), ModbusException> {
        let range = self
            .config
            .discrete_inputs
            .relative_range(start, count)
            .ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let bit = image
                        .bool_at(BoolArray::Input, addr / 8, addr % 8)
                        .map_err(|_| ModbusException::IllegalDataAddress)?;
                    if bit {
                        out[i / 8] |= 1 << (i % 8);
                    }
                }
                Ok(())
            })
            .await
    }

    pub async fn write_coil(&self, addr: u16, value: bool) -> Result<(), ModbusException> {
        let range = self.config.coils.relative_range(addr, 1).ok_or(ModbusException::IllegalDataAddress)?;
        let rel = range.start;
        self.glue
            .with_locked(|image| {
                image
                    .set_bool_at(BoolArray::Output, rel / 8, rel % 8, value)
                    .map_err(|_| ModbusException::IllegalDataAddress)
            })
            .await
    }

    pub async fn write_coils(&self, start: u16, count: u16, bytes: &[u8]) -> Result<(), ModbusException> {
        let range = self.config.coils.relative_range(start, count).ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let value = (bytes[i / 8] >> (i % 8)) & 0x01 != 0;
                    image
                        .set_bool_at(BoolArray::Output, addr / 8, addr % 8, value)
                        .map_err(|_| ModbusException::IllegalDataAddress)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn read_holding_registers(&self, start: u16, count: u16, out: &mut [u8]) -> Result<(), ModbusException> {
        let range = self
            .config
            .holding_registers
            .relative_range(start, count)
            .ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let word = image.holding_register_word(addr).map_err(|_| ModbusException::IllegalDataAddress)?;
                    out[i * 2] = high_byte(word);
                    out[i * 2 + 1] = low_byte(word);
                }
                Ok(())
            })
            .await
    }

    pub async fn write_holding_register(&self, addr: u16, bytes: &[u8]) -> Result<(), ModbusException> {
        self.write_holding_registers(addr, 1, bytes).await
    }

    pub async fn write_holding_registers(&self, start: u16, count: u16, bytes: &[u8]) -> Result<(), ModbusException> {
        let range = self
            .config
            .holding_registers
            .relative_range(start, count)
            .ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let word = to_word(bytes[i * 2], bytes[i * 2 + 1]);
                    image.set_holding_register_word(addr, word).map_err(|_| ModbusException::IllegalDataAddress)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn read_input_registers(&self, start: u16, count: u16, out: &mut [u8]) -> Result<(), ModbusException> {
        let range = self
            .config
            .input_registers
            .relative_range(start, count)
            .ok_or(ModbusException::IllegalDataAddress)?;
        self.glue
            .with_locked(|image| {
                for (i, addr) in range.enumerate() {
                    let word = image
                        .word_at(WordArray::Input, addr)
                        .map_err(|_| ModbusException::IllegalDataAddress)?;
                    out[i * 2] = high_byte(word);
                    out[i * 2 + 1] = low_byte(word);
                }
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glue::image::{BoolArray, WordArray};

    async fn strategy_with(f: impl FnOnce(&mut crate::glue::image::IoImageState)) -> IndexedStrategy {
        let glue = GlueBinding::new(50_000_000);
        glue.with_locked(f).await;
        IndexedStrategy::new(glue, IndexedStrategyConfig::default())
    }

    #[tokio::test]
    async fn read_coils_packs_lsb_first() {
        let strategy = strategy_with(|image| {
            image.bind_bool(BoolArray::Output, 0, 0, true);
            image.bind_bool(BoolArray::Output, 0, 1, false);
            image.bind_bool(BoolArray::Output, 0, 2, true);
        })
        .await;

        let mut out = [0u8; 1];
        strategy.read_coils(0, 3, &mut out).await.unwrap();
        assert_eq!(out[0], 0b0000_0101);
    }

    #[tokio::test]
    async fn write_coil_rejects_unbound_cell() {
        let strategy = strategy_with(|_| {}).await;
        let result = strategy.write_coil(0, true).await;
        assert_eq!(result, Err(ModbusException::IllegalDataAddress));
    }

    #[tokio::test]
    async fn holding_register_write_then_read_back() {
        let strategy = strategy_with(|image| {
            image.bind_word(WordArray::Output, 0, 0);
        })
        .await;

        strategy.write_holding_register(0, &[0x01, 0x02]).await.unwrap();
        let mut out = [0u8; 2];
        strategy.read_holding_registers(0, 1, &mut out).await.unwrap();
        assert_eq!(out, [0x01, 0x02]);
    }

    #[tokio::test]
    async fn out_of_range_address_is_illegal_data_address() {
        let strategy = strategy_with(|_| {}).await;
        let mut out = [0u8; 2];
        let result = strategy.read_holding_registers(0xFFFF, 1, &mut out).await;
        assert_eq!(result, Err(ModbusException::IllegalDataAddress));
    }
}
