//! # Domain Record Decoders
//!
//! Pure functions that turn table records and snooped payloads into
//! human-meaningful records. Nothing here performs I/O.
//!
//! Snooped reports share an address window per device, so [`SnoopReport::parse`]
//! selects the record shape from the three leading payload bytes and ignores
//! discriminators it does not recognise.

use crate::constants::{
    DISC_AIR_HANDLER_BLOWER, DISC_AIR_HANDLER_DUCT, DISC_HEAT_PUMP_STAGE, DISC_HEAT_PUMP_TEMPS,
    HEAT_PUMP_STAGE_SHIFT, HEAT_PUMP_TEMP_DIVISOR, MODE_MASK, MODE_STAGE_SHIFT, ZONE1_HOLD_MASK,
};
use crate::tables::{TStatCurrentParams, TStatZoneParams};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Electric heat status bits in the air-handler duct report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeatStatus: u8 {
        const ELEC_HEAT_STAGE1 = 0x01;
        const ELEC_HEAT_STAGE2 = 0x02;
    }
}

/// Operating mode, the low nibble of the thermostat mode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Heat,
    Cool,
    Auto,
    Electric,
    HeatPump,
    Off,
    Unknown(u8),
}

impl From<u8> for Mode {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Mode::Heat,
            1 => Mode::Cool,
            2 => Mode::Auto,
            3 => Mode::Electric,
            4 => Mode::HeatPump,
            5 => Mode::Off,
            other => Mode::Unknown(other),
        }
    }
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Heat => "heat",
            Mode::Cool => "cool",
            Mode::Auto => "auto",
            Mode::Electric => "electric",
            Mode::HeatPump => "heatpump",
            Mode::Off => "off",
            Mode::Unknown(_) => "unknown",
        }
    }
}

pub fn fan_mode_str(raw: u8) -> &'static str {
    match raw {
        0 => "auto",
        1 => "low",
        2 => "med",
        3 => "high",
        _ => "unknown",
    }
}

/// Splits the bit-packed mode byte into `(mode, stage)`.
pub fn split_mode(raw: u8) -> (u8, u8) {
    (raw & MODE_MASK, raw >> MODE_STAGE_SHIFT)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatZoneConfig {
    pub current_temp: u8,
    pub current_humidity: u8,
    pub outdoor_temp: u8,
    pub mode: String,
    pub stage: u8,
    pub fan_mode: String,
    pub hold: Option<bool>,
    pub heat_setpoint: u8,
    pub cool_setpoint: u8,
    pub raw_mode: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirHandlerBlower {
    #[serde(rename = "blowerRPM")]
    pub blower_rpm: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirHandlerDuct {
    #[serde(rename = "airFlowCFM")]
    pub air_flow_cfm: u16,
    pub elec_heat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirHandlerTelemetry {
    #[serde(rename = "blowerRPM")]
    pub blower_rpm: u16,
    #[serde(rename = "airFlowCFM")]
    pub air_flow_cfm: u16,
    pub elec_heat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatPumpTemperatures {
    pub coil_temp: f32,
    pub outside_temp: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatPumpStage {
    pub stage: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatPumpTelemetry {
    pub coil_temp: f32,
    pub outside_temp: f32,
    pub stage: u8,
}

/// Every value the state cache holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DomainRecord {
    Thermostat(ThermostatZoneConfig),
    Blower(AirHandlerBlower),
    Duct(AirHandlerDuct),
    HeatPump(HeatPumpTemperatures),
    HeatPumpStage(HeatPumpStage),
}

/// Composes zone 1 configuration from the two thermostat tables.
pub fn thermostat_zone_config(
    zone: &TStatZoneParams,
    current: &TStatCurrentParams,
) -> ThermostatZoneConfig {
    let (mode, stage) = split_mode(current.mode);
    ThermostatZoneConfig {
        current_temp: current.zone_current_temp[0],
        current_humidity: current.zone_current_humidity[0],
        outdoor_temp: current.outdoor_air_temp,
        mode: Mode::from(mode).as_str().to_string(),
        stage,
        fan_mode: fan_mode_str(zone.zone_fan_mode[0]).to_string(),
        hold: Some(zone.zone_hold & ZONE1_HOLD_MASK != 0),
        heat_setpoint: zone.zone_heat_setpoint[0],
        cool_setpoint: zone.zone_cool_setpoint[0],
        raw_mode: current.mode,
    }
}

fn be16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn sixteenths(raw: u16) -> f32 {
    f32::from(raw as i16) / HEAT_PUMP_TEMP_DIVISOR
}

/// `00 3e 01`: outside temperature then coil temperature, sixteenths of a degree.
///
/// Both readings are signed, so winter temperatures below zero come out negative.
pub fn heat_pump_temperatures(data: &[u8]) -> Option<HeatPumpTemperatures> {
    Some(HeatPumpTemperatures {
        outside_temp: sixteenths(be16(data, 0)?),
        coil_temp: sixteenths(be16(data, 2)?),
    })
}

/// `00 3e 02`: stage is the first byte shifted right once.
pub fn heat_pump_stage(data: &[u8]) -> Option<HeatPumpStage> {
    let raw = *data.first()?;
    Some(HeatPumpStage {
        stage: raw >> HEAT_PUMP_STAGE_SHIFT,
    })
}

/// `00 03 06`: blower RPM at offset 1.
pub fn air_handler_blower(data: &[u8]) -> Option<AirHandlerBlower> {
    Some(AirHandlerBlower {
        blower_rpm: be16(data, 1)?,
    })
}

/// `00 03 16`: heat status at offset 0, airflow CFM at offset 4.
pub fn air_handler_duct(data: &[u8]) -> Option<AirHandlerDuct> {
    let status = HeatStatus::from_bits_truncate(*data.first()?);
    Some(AirHandlerDuct {
        air_flow_cfm: be16(data, 4)?,
        elec_heat: !status.is_empty(),
    })
}

/// A snooped report, selected by its discriminator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnoopReport {
    HeatPumpTemperatures(HeatPumpTemperatures),
    HeatPumpStage(HeatPumpStage),
    Blower(AirHandlerBlower),
    Duct(AirHandlerDuct),
}

/// Outcome of classifying a snooped payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnoopDecode {
    Report(SnoopReport),
    /// Discriminator recognised but the payload is too short for its shape.
    Short([u8; 3]),
    /// Unknown discriminator or no discriminator at all.
    Ignored,
}

impl SnoopReport {
    /// Classifies a full frame payload (discriminator included).
    pub fn parse(payload: &[u8]) -> SnoopDecode {
        let Some(head) = payload.get(..3) else {
            return SnoopDecode::Ignored;
        };
        let disc = [head[0], head[1], head[2]];
        let data = &payload[3..];

        let report = match disc {
            DISC_HEAT_PUMP_TEMPS => heat_pump_temperatures(data).map(Self::HeatPumpTemperatures),
            DISC_HEAT_PUMP_STAGE => heat_pump_stage(data).map(Self::HeatPumpStage),
            DISC_AIR_HANDLER_BLOWER => air_handler_blower(data).map(Self::Blower),
            DISC_AIR_HANDLER_DUCT => air_handler_duct(data).map(Self::Duct),
            _ => return SnoopDecode::Ignored,
        };
        match report {
            Some(report) => SnoopDecode::Report(report),
            None => SnoopDecode::Short(disc),
        }
    }

    /// Cache key and record for this report.
    pub fn into_record(self) -> (&'static str, DomainRecord) {
        use crate::constants::{KEY_BLOWER, KEY_DUCT, KEY_HEAT_PUMP, KEY_HEAT_PUMP_STAGE};
        match self {
            Self::HeatPumpTemperatures(t) => (KEY_HEAT_PUMP, DomainRecord::HeatPump(t)),
            Self::HeatPumpStage(s) => (KEY_HEAT_PUMP_STAGE, DomainRecord::HeatPumpStage(s)),
            Self::Blower(b) => (KEY_BLOWER, DomainRecord::Blower(b)),
            Self::Duct(d) => (KEY_DUCT, DomainRecord::Duct(d)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_byte_0x25() {
        assert_eq!(split_mode(0x25), (0x5, 1));
        assert_eq!(Mode::from(split_mode(0x25).0), Mode::Off);
    }

    #[test]
    fn test_heat_pump_coil_literal() {
        let payload = [0x00, 0x3e, 0x01, 0x02, 0x80, 0x01, 0x00];
        match SnoopReport::parse(&payload) {
            SnoopDecode::Report(SnoopReport::HeatPumpTemperatures(t)) => {
                assert_eq!(t.coil_temp, 16.0);
                assert_eq!(t.outside_temp, 40.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_heat_pump_stage_literal() {
        let payload = [0x00, 0x3e, 0x02, 0x05];
        assert_eq!(
            SnoopReport::parse(&payload),
            SnoopDecode::Report(SnoopReport::HeatPumpStage(HeatPumpStage { stage: 2 }))
        );
    }

    #[test]
    fn test_negative_outside_temp() {
        // -2.5 degrees is 0xFFD8 in sixteenths.
        let t = heat_pump_temperatures(&[0xFF, 0xD8, 0x00, 0x10]).unwrap();
        assert_eq!(t.outside_temp, -2.5);
        assert_eq!(t.coil_temp, 1.0);
    }

    #[test]
    fn test_blower_offset() {
        let b = air_handler_blower(&[0xAA, 0x03, 0x20]).unwrap();
        assert_eq!(b.blower_rpm, 800);
    }

    #[test]
    fn test_duct_heat_bits() {
        let on = air_handler_duct(&[0x02, 0, 0, 0, 0x02, 0x58]).unwrap();
        assert_eq!(on, AirHandlerDuct { air_flow_cfm: 600, elec_heat: true });
        let off = air_handler_duct(&[0xFC, 0, 0, 0, 0x02, 0x58]).unwrap();
        assert!(!off.elec_heat);
    }

    #[test]
    fn test_unknown_and_short_reports() {
        assert_eq!(SnoopReport::parse(&[0x00, 0x3e, 0x7f, 1, 2]), SnoopDecode::Ignored);
        assert_eq!(SnoopReport::parse(&[0x00, 0x3e]), SnoopDecode::Ignored);
        assert_eq!(
            SnoopReport::parse(&[0x00, 0x03, 0x16, 0x01]),
            SnoopDecode::Short(DISC_AIR_HANDLER_DUCT)
        );
    }

    #[test]
    fn test_thermostat_zone_config() {
        let mut current = TStatCurrentParams::default();
        current.zone_current_temp[0] = 70;
        current.zone_current_humidity[0] = 40;
        current.outdoor_air_temp = 31;
        current.mode = 0x20;
        let mut zone = TStatZoneParams::default();
        zone.zone_fan_mode[0] = 3;
        zone.zone_hold = 0x03;
        zone.zone_heat_setpoint[0] = 68;
        zone.zone_cool_setpoint[0] = 74;

        let cfg = thermostat_zone_config(&zone, &current);
        assert_eq!(cfg.mode, "heat");
        assert_eq!(cfg.stage, 1);
        assert_eq!(cfg.fan_mode, "high");
        assert_eq!(cfg.hold, Some(true));
        assert_eq!(cfg.raw_mode, 0x20);
        assert_eq!(cfg.current_temp, 70);
        assert_eq!(cfg.outdoor_temp, 31);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(AirHandlerTelemetry {
            blower_rpm: 1,
            air_flow_cfm: 2,
            elec_heat: false,
        })
        .unwrap();
        assert_eq!(json["blowerRPM"], 1);
        assert_eq!(json["airFlowCFM"], 2);
        assert_eq!(json["elecHeat"], false);
    }
}
