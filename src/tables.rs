//! # Device Tables
//!
//! Each remote register block is identified by a [`DeviceTableAddress`] and has a
//! fixed payload layout. The layouts are Rust types implementing [`Table`], so the
//! mapping from address to schema is fixed at compile time.

use crate::constants::{
    DEVICE_AIR_HANDLER, DEVICE_HEAT_PUMP, DEVICE_SAM, DEVICE_THERMOSTAT, SNOOP_AIR_HANDLER_HIGH,
    SNOOP_AIR_HANDLER_LOW, SNOOP_HEAT_PUMP_HIGH, SNOOP_HEAT_PUMP_LOW, TABLE_ADDRESS_LEN,
    TABLE_TSTAT_CURRENT_PARAMS, TABLE_TSTAT_ZONE_PARAMS,
};
use crate::error::TransactionError;
use crate::util::hex::encode_hex;
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use std::fmt;

/// Devices on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Thermostat,
    AirHandler,
    HeatPump,
    Sam,
}

impl Device {
    pub fn address(self) -> u16 {
        match self {
            Device::Thermostat => DEVICE_THERMOSTAT,
            Device::AirHandler => DEVICE_AIR_HANDLER,
            Device::HeatPump => DEVICE_HEAT_PUMP,
            Device::Sam => DEVICE_SAM,
        }
    }

    /// Inclusive range of source addresses this device publishes unsolicited
    /// reports from, if it publishes any.
    pub fn report_window(self) -> Option<(u16, u16)> {
        match self {
            Device::AirHandler => Some((SNOOP_AIR_HANDLER_LOW, SNOOP_AIR_HANDLER_HIGH)),
            Device::HeatPump => Some((SNOOP_HEAT_PUMP_LOW, SNOOP_HEAT_PUMP_HIGH)),
            Device::Thermostat | Device::Sam => None,
        }
    }
}

/// Register blocks this crate knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    TStatCurrentParams,
    TStatZoneParams,
}

impl TableId {
    pub fn bytes(self) -> [u8; TABLE_ADDRESS_LEN] {
        match self {
            TableId::TStatCurrentParams => TABLE_TSTAT_CURRENT_PARAMS,
            TableId::TStatZoneParams => TABLE_TSTAT_ZONE_PARAMS,
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.bytes()))
    }
}

/// A `(device, table)` pair naming one remote register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceTableAddress {
    pub device: Device,
    pub table: TableId,
}

impl fmt::Display for DeviceTableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}", self.device, self.table)
    }
}

/// Fixed-layout schema of a register block.
pub trait Table: Sized + Send + 'static {
    const ADDRESS: DeviceTableAddress;
    /// Minimum number of table bytes following the table address.
    const LEN: usize;

    fn parse(input: &[u8]) -> IResult<&[u8], Self>;

    /// Decodes the bytes after the table address of a response.
    fn from_table_data(data: &[u8]) -> Result<Self, TransactionError> {
        let mismatch = || TransactionError::SchemaMismatch {
            table: Self::ADDRESS.table.to_string(),
            expected: Self::LEN,
            actual: data.len(),
        };
        if data.len() < Self::LEN {
            return Err(mismatch());
        }
        Self::parse(data).map(|(_, table)| table).map_err(|_| mismatch())
    }
}

fn array<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
    let (input, bytes) = take(N)(input)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok((input, out))
}

/// Thermostat current parameters (`00 3b 02`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TStatCurrentParams {
    pub zone_current_temp: [u8; 8],
    pub zone_current_humidity: [u8; 8],
    pub unknown1: u8,
    pub outdoor_air_temp: u8,
    /// Bitmap, bit `n` set when zone `n + 1` is unoccupied.
    pub zone_unoccupied: u8,
    /// Bit-packed: low nibble is the operating mode, `>> 5` the active stage.
    pub mode: u8,
    pub unknown2: [u8; 5],
    pub displayed_zone: u8,
}

impl Table for TStatCurrentParams {
    const ADDRESS: DeviceTableAddress = DeviceTableAddress {
        device: Device::Thermostat,
        table: TableId::TStatCurrentParams,
    };
    const LEN: usize = 26;

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, zone_current_temp) = array::<8>(input)?;
        let (input, zone_current_humidity) = array::<8>(input)?;
        let (input, unknown1) = be_u8(input)?;
        let (input, outdoor_air_temp) = be_u8(input)?;
        let (input, zone_unoccupied) = be_u8(input)?;
        let (input, mode) = be_u8(input)?;
        let (input, unknown2) = array::<5>(input)?;
        let (input, displayed_zone) = be_u8(input)?;
        Ok((
            input,
            TStatCurrentParams {
                zone_current_temp,
                zone_current_humidity,
                unknown1,
                outdoor_air_temp,
                zone_unoccupied,
                mode,
                unknown2,
                displayed_zone,
            },
        ))
    }
}

/// Thermostat zone parameters (`00 3b 03`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TStatZoneParams {
    pub zone_fan_mode: [u8; 8],
    /// Bitmap, bit `n` set when zone `n + 1` is on hold.
    pub zone_hold: u8,
    pub zone_heat_setpoint: [u8; 8],
    pub zone_cool_setpoint: [u8; 8],
    pub zone_target_humidity: [u8; 8],
    pub fan_auto_config: u8,
    pub unknown: u8,
    /// Minutes.
    pub zone_hold_duration: [u16; 8],
    pub zone_name: [[u8; 12]; 8],
}

impl TStatZoneParams {
    /// Zone name with NUL padding removed. `zone` is zero-based.
    pub fn zone_name(&self, zone: usize) -> Option<String> {
        let raw = self.zone_name.get(zone)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(&raw[..end]).trim_end().to_string())
    }
}

impl Table for TStatZoneParams {
    const ADDRESS: DeviceTableAddress = DeviceTableAddress {
        device: Device::Thermostat,
        table: TableId::TStatZoneParams,
    };
    const LEN: usize = 147;

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, zone_fan_mode) = array::<8>(input)?;
        let (input, zone_hold) = be_u8(input)?;
        let (input, zone_heat_setpoint) = array::<8>(input)?;
        let (input, zone_cool_setpoint) = array::<8>(input)?;
        let (input, zone_target_humidity) = array::<8>(input)?;
        let (input, fan_auto_config) = be_u8(input)?;
        let (mut input, unknown) = be_u8(input)?;

        let mut zone_hold_duration = [0u16; 8];
        for slot in zone_hold_duration.iter_mut() {
            let (rest, minutes) = be_u16(input)?;
            *slot = minutes;
            input = rest;
        }

        let mut zone_name = [[0u8; 12]; 8];
        for slot in zone_name.iter_mut() {
            let (rest, name) = array::<12>(input)?;
            *slot = name;
            input = rest;
        }

        Ok((
            input,
            TStatZoneParams {
                zone_fan_mode,
                zone_hold,
                zone_heat_setpoint,
                zone_cool_setpoint,
                zone_target_humidity,
                fan_auto_config,
                unknown,
                zone_hold_duration,
                zone_name,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_windows_cover_own_address() {
        for device in [Device::AirHandler, Device::HeatPump] {
            let (low, high) = device.report_window().unwrap();
            assert!((low..=high).contains(&device.address()), "{device:?}");
        }
        assert_eq!(Device::Thermostat.report_window(), None);
        assert_eq!(Device::Sam.report_window(), None);
    }

    #[test]
    fn test_address_display() {
        let address = DeviceTableAddress {
            device: Device::Thermostat,
            table: TableId::TStatZoneParams,
        };
        assert_eq!(address.to_string(), "Thermostat/003b03");
    }

    #[test]
    fn test_current_params_layout() {
        let mut data = vec![0u8; TStatCurrentParams::LEN];
        data[0] = 71; // zone 1 temp
        data[8] = 45; // zone 1 humidity
        data[17] = 38; // outdoor
        data[19] = 0x25; // mode
        data[25] = 1;
        let params = TStatCurrentParams::from_table_data(&data).unwrap();
        assert_eq!(params.zone_current_temp[0], 71);
        assert_eq!(params.zone_current_humidity[0], 45);
        assert_eq!(params.outdoor_air_temp, 38);
        assert_eq!(params.mode, 0x25);
        assert_eq!(params.displayed_zone, 1);
    }

    #[test]
    fn test_zone_params_layout() {
        let mut data = vec![0u8; TStatZoneParams::LEN];
        data[0] = 2; // zone 1 fan mode
        data[8] = 0x01; // hold bitmap
        data[9] = 68; // zone 1 heat setpoint
        data[17] = 76; // zone 1 cool setpoint
        data[35] = 0x00;
        data[36] = 0x78; // zone 1 hold duration
        data[51..55].copy_from_slice(b"ZONE");
        let params = TStatZoneParams::from_table_data(&data).unwrap();
        assert_eq!(params.zone_fan_mode[0], 2);
        assert_eq!(params.zone_hold, 1);
        assert_eq!(params.zone_heat_setpoint[0], 68);
        assert_eq!(params.zone_cool_setpoint[0], 76);
        assert_eq!(params.zone_hold_duration[0], 120);
        assert_eq!(params.zone_name(0).as_deref(), Some("ZONE"));
        assert_eq!(params.zone_name(8), None);
    }

    #[test]
    fn test_short_payload_is_schema_mismatch() {
        let err = TStatCurrentParams::from_table_data(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            TransactionError::SchemaMismatch {
                table: "003b02".into(),
                expected: 26,
                actual: 10,
            }
        );
    }

    #[test]
    fn test_surplus_bytes_are_ignored() {
        let data = vec![0u8; TStatCurrentParams::LEN + 4];
        assert!(TStatCurrentParams::from_table_data(&data).is_ok());
    }
}
