//! Modbus/TCP slave protocol: frame parsing, function-code dispatch, and
//! exception encoding. `process_message` mirrors the original's
//! `process_modbus_message` contract: it rewrites its buffer in place and
//! returns the response length.

pub mod server;
pub mod strategy;
pub mod wire;

use crate::error::ModbusException;
use strategy::IndexedStrategy;
use wire::*;

pub async fn process_message(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> usize {
    if size < MIN_REQUEST_LEN {
        return write_exception(buffer, ModbusException::IllegalFunction);
    }

    let function = buffer[7];
    match dispatch(buffer, size, function, strategy).await {
        Ok(len) => len,
        Err(exc) => write_exception(buffer, exc),
    }
}

async fn dispatch(buffer: &mut [u8], size: usize, function: u8, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    match function {
        FC_READ_COILS => read_coils_pdu(buffer, size, strategy).await,
        FC_READ_DISCRETE_INPUTS => read_discrete_inputs_pdu(buffer, size, strategy).await,
        FC_READ_HOLDING_REGISTERS => read_holding_registers_pdu(buffer, size, strategy).await,
        FC_READ_INPUT_REGISTERS => read_input_registers_pdu(buffer, size, strategy).await,
        FC_WRITE_COIL => write_coil_pdu(buffer, size, strategy).await,
        FC_WRITE_REGISTER => write_register_pdu(buffer, size, strategy).await,
        FC_WRITE_MULTIPLE_COILS => write_multiple_coils_pdu(buffer, size, strategy).await,
        FC_WRITE_MULTIPLE_REGISTERS => write_multiple_registers_pdu(buffer, size, strategy).await,
        _ => Err(ModbusException::IllegalFunction),
    }
}

fn write_exception(buffer: &mut [u8], exc: ModbusException) -> usize {
    buffer[4] = 0;
    buffer[5] = 3;
    buffer[7] |= 0x80;
    buffer[8] = exc.code();
    9
}

fn read_sizes(buffer: &[u8], size: usize) -> Result<(u16, u16), ModbusException> {
    if size < MIN_SIZED_REQUEST_LEN {
        return Err(ModbusException::IllegalDataValue);
    }
    Ok((to_word(buffer[8], buffer[9]), to_word(buffer[10], buffer[11])))
}

fn byte_count_for_bits(count: u16) -> Result<u16, ModbusException> {
    let bytes = (count + 7) / 8;
    if bytes > 255 {
        return Err(ModbusException::IllegalDataAddress);
    }
    Ok(bytes)
}

async fn read_coils_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = byte_count_for_bits(count)?;
    let region = &mut buffer[9..9 + byte_count as usize];
    region.fill(0);
    strategy.read_coils(start, count, region).await?;
    buffer[4] = high_byte(byte_count + 3);
    buffer[5] = low_byte(byte_count + 3);
    buffer[8] = byte_count as u8;
    Ok(9 + byte_count as usize)
}

async fn read_discrete_inputs_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = byte_count_for_bits(count)?;
    let region = &mut buffer[9..9 + byte_count as usize];
    region.fill(0);
    strategy.read_discrete_inputs(start, count, region).await?;
    buffer[4] = high_byte(byte_count + 3);
    buffer[5] = low_byte(byte_count + 3);
    buffer[8] = byte_count as u8;
    Ok(9 + byte_count as usize)
}

async fn read_holding_registers_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = count.checked_mul(2).ok_or(ModbusException::IllegalDataValue)?;
    if byte_count > 255 {
        return Err(ModbusException::IllegalDataValue);
    }
    let region = &mut buffer[9..9 + byte_count as usize];
    strategy.read_holding_registers(start, count, region).await?;
    buffer[4] = high_byte(byte_count + 3);
    buffer[5] = low_byte(byte_count + 3);
    buffer[8] = byte_count as u8;
    Ok(9 + byte_count as usize)
}

async fn read_input_registers_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = count.checked_mul(2).ok_or(ModbusException::IllegalDataValue)?;
    if byte_count > 255 {
        return Err(ModbusException::IllegalDataValue);
    }
    let region = &mut buffer[9..9 + byte_count as usize];
    strategy.read_input_registers(start, count, region).await?;
    buffer[4] = high_byte(byte_count + 3);
    buffer[5] = low_byte(byte_count + 3);
    buffer[8] = byte_count as u8;
    Ok(9 + byte_count as usize)
}

async fn write_coil_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    if size < MIN_SIZED_REQUEST_LEN {
        return Err(ModbusException::IllegalDataValue);
    }
    let addr = to_word(buffer[8], buffer[9]);
    let value = to_word(buffer[10], buffer[11]) != 0;
    strategy.write_coil(addr, value).await?;
    buffer[4] = 0;
    buffer[5] = 6;
    Ok(12)
}

async fn write_register_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    if size < MIN_SIZED_REQUEST_LEN {
        return Err(ModbusException::IllegalDataValue);
    }
    let addr = to_word(buffer[8], buffer[9]);
    strategy.write_holding_register(addr, &buffer[10..12]).await?;
    buffer[4] = 0;
    buffer[5] = 6;
    Ok(12)
}

async fn write_multiple_coils_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = byte_count_for_bits(count)?;
    if size < byte_count as usize + 13 || buffer[12] != byte_count as u8 {
        return Err(ModbusException::IllegalDataValue);
    }
    strategy.write_coils(start, count, &buffer[13..13 + byte_count as usize]).await?;
    buffer[4] = 0;
    buffer[5] = 6;
    Ok(12)
}

async fn write_multiple_registers_pdu(buffer: &mut [u8], size: usize, strategy: &IndexedStrategy) -> Result<usize, ModbusException> {
    let (start, count) = read_sizes(buffer, size)?;
    let byte_count = count.checked_mul(2).ok_or(ModbusException::IllegalDataValue)?;
    if size < byte_count as usize + 13 || buffer[12] != byte_count as u8 {
        return Err(ModbusException::IllegalDataValue);
    }
    strategy
        .write_holding_registers(start, count, &buffer[13..13 + byte_count as usize])
        .await?;
    buffer[4] = 0;
    buffer[5] = 6;
    Ok(12)
}
