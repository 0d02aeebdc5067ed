//! Concurrency tests for the state cache.

use infinity_bus::cache::StateCache;
use infinity_bus::decode::{AirHandlerTelemetry, DomainRecord, HeatPumpTemperatures};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const WRITERS: u16 = 4;
const READERS: usize = 4;
const WRITES: u16 = 2_000;

/// Every field of a record written by writer `w` at step `i` is derived from `(w, i)`,
/// so a reader can tell a torn record from a whole one.
fn telemetry(w: u16, i: u16) -> AirHandlerTelemetry {
    AirHandlerTelemetry {
        blower_rpm: w * 10_000 + i,
        air_flow_cfm: (w * 10_000 + i).wrapping_mul(3),
        elec_heat: (w + i) % 2 == 0,
    }
}

fn is_whole(t: &AirHandlerTelemetry) -> bool {
    let w = t.blower_rpm / 10_000;
    let i = t.blower_rpm % 10_000;
    *t == telemetry(w, i)
}

#[test]
fn test_concurrent_writers_and_readers_never_see_torn_records() {
    let cache = Arc::new(StateCache::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observed = 0u64;
                while !done.load(Ordering::Acquire) {
                    if let Some(entry) = cache.entry("airhandler") {
                        assert!(is_whole(&entry.value), "torn record: {:?}", entry.value);
                        assert_eq!(entry.key, "airhandler");
                        observed += 1;
                    }
                }
                observed
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..WRITES {
                    cache.update("airhandler", telemetry(w, i));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    let last = cache.get("airhandler").unwrap();
    assert!(is_whole(&last));
    assert_eq!(last.blower_rpm % 10_000, WRITES - 1);
}

#[test]
fn test_distinct_keys_never_torn() {
    let cache = Arc::new(StateCache::new());
    let done = Arc::new(AtomicBool::new(false));
    let keys: Vec<String> = (0..WRITERS).map(|w| format!("k{w}")).collect();

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let done = Arc::clone(&done);
            let keys = keys.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    for (w, key) in keys.iter().enumerate() {
                        let Some(entry) = cache.entry(key) else {
                            continue;
                        };
                        assert!(is_whole(&entry.value), "torn record: {:?}", entry.value);
                        assert_eq!(usize::from(entry.value.blower_rpm / 10_000), w);
                        assert_eq!(&entry.key, key);
                    }
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let key = format!("k{w}");
                for i in 0..WRITES {
                    cache.update(&key, telemetry(w, i));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(cache.len(), usize::from(WRITERS));
    for (w, key) in (0..WRITERS).zip(&keys) {
        assert_eq!(cache.get(key), Some(telemetry(w, WRITES - 1)));
    }
}

#[test]
fn test_write_is_visible_to_other_threads() {
    let cache: Arc<StateCache<DomainRecord>> = Arc::new(StateCache::new());
    let record = DomainRecord::HeatPump(HeatPumpTemperatures {
        coil_temp: 16.0,
        outside_temp: -2.5,
    });

    let writer = {
        let cache = Arc::clone(&cache);
        let record = record.clone();
        thread::spawn(move || cache.update("heatpump", record))
    };
    writer.join().unwrap();

    let reader = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.get("heatpump"))
    };
    assert_eq!(reader.join().unwrap(), Some(record));
}

#[test]
fn test_keys_are_independent() {
    let cache = StateCache::new();
    cache.update("blower", 1u16);
    cache.update("duct", 2u16);
    cache.update("blower", 3u16);

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["blower".to_string(), "duct".to_string()]);
    assert_eq!(cache.get("duct"), Some(2));
    assert_eq!(cache.get("blower"), Some(3));
    assert_eq!(cache.get("thermostat"), None);
}
