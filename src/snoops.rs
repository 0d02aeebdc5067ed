//! Telemetry snoops.
//!
//! The air handler and heat pump publish reports that nobody on the bus asks
//! this system for. These handlers pick them out of the traffic and write the
//! decoded records into the state cache.

use crate::bus::frame::InfinityFrame;
use crate::bus::snoop::SnoopDispatcher;
use crate::cache::StateCache;
use crate::decode::{DomainRecord, SnoopDecode, SnoopReport};
use crate::tables::Device;
use crate::util::hex::format_hex_compact;
use log::debug;
use std::sync::Arc;

/// Decodes one snooped frame into the cache. Returns the key written, if any.
pub fn record_report(cache: &StateCache<DomainRecord>, frame: &InfinityFrame) -> Option<&'static str> {
    match SnoopReport::parse(&frame.data) {
        SnoopDecode::Report(report) => {
            debug!("0x{:04X}: {:?}", frame.src, report);
            let (key, record) = report.into_record();
            cache.update(key, record);
            Some(key)
        }
        SnoopDecode::Short(disc) => {
            debug!(
                "0x{:04X}: short {} report ({} bytes)",
                frame.src,
                format_hex_compact(&disc),
                frame.data.len()
            );
            None
        }
        SnoopDecode::Ignored => None,
    }
}

/// Registers the heat-pump and air-handler response windows.
pub fn attach_snoops(dispatcher: &SnoopDispatcher, cache: Arc<StateCache<DomainRecord>>) {
    for device in [Device::HeatPump, Device::AirHandler] {
        let Some((low, high)) = device.report_window() else {
            continue;
        };
        let cache = Arc::clone(&cache);
        dispatcher.register_response_range(low, high, move |frame| {
            record_report(&cache, frame);
        });
    }
}
