//! State export.
//!
//! Read-side view of the cache for the presentation layer. Each accessor
//! composes one or more cache entries and returns `None` until every entry it
//! needs has been written at least once; it never fabricates a zero-valued
//! record.

use crate::cache::StateCache;
use crate::constants::{KEY_BLOWER, KEY_DUCT, KEY_HEAT_PUMP, KEY_HEAT_PUMP_STAGE, KEY_THERMOSTAT};
use crate::decode::{AirHandlerTelemetry, DomainRecord, HeatPumpTelemetry, ThermostatZoneConfig};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HvacState {
    cache: Arc<StateCache<DomainRecord>>,
}

impl HvacState {
    pub fn new(cache: Arc<StateCache<DomainRecord>>) -> Self {
        HvacState { cache }
    }

    pub fn cache(&self) -> &Arc<StateCache<DomainRecord>> {
        &self.cache
    }

    pub fn get_thermostat_config(&self) -> Option<ThermostatZoneConfig> {
        match self.cache.get(KEY_THERMOSTAT)? {
            DomainRecord::Thermostat(cfg) => Some(cfg),
            _ => None,
        }
    }

    pub fn get_air_handler_state(&self) -> Option<AirHandlerTelemetry> {
        let blower = match self.cache.get(KEY_BLOWER)? {
            DomainRecord::Blower(b) => b,
            _ => return None,
        };
        let duct = match self.cache.get(KEY_DUCT)? {
            DomainRecord::Duct(d) => d,
            _ => return None,
        };
        Some(AirHandlerTelemetry {
            blower_rpm: blower.blower_rpm,
            air_flow_cfm: duct.air_flow_cfm,
            elec_heat: duct.elec_heat,
        })
    }

    pub fn get_heat_pump_state(&self) -> Option<HeatPumpTelemetry> {
        let temps = match self.cache.get(KEY_HEAT_PUMP)? {
            DomainRecord::HeatPump(t) => t,
            _ => return None,
        };
        let stage = match self.cache.get(KEY_HEAT_PUMP_STAGE)? {
            DomainRecord::HeatPumpStage(s) => s,
            _ => return None,
        };
        Some(HeatPumpTelemetry {
            coil_temp: temps.coil_temp,
            outside_temp: temps.outside_temp,
            stage: stage.stage,
        })
    }
}
