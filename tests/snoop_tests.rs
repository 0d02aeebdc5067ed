//! End-to-end: a gateway over a simulated bus, fed by polled tables and by
//! unsolicited telemetry.

use infinity_bus::bus::serial_mock::{FailingPort, MockSerialPort};
use infinity_bus::bus::{InfinityFrame, Op};
use infinity_bus::constants::{
    DEVICE_AIR_HANDLER, DEVICE_HEAT_PUMP, DEVICE_THERMOSTAT, TABLE_TSTAT_CURRENT_PARAMS,
    TABLE_TSTAT_ZONE_PARAMS,
};
use infinity_bus::tables::{TStatCurrentParams, TStatZoneParams, Table};
use infinity_bus::util::hex::decode_hex;
use infinity_bus::{BusConfig, Gateway, HvacState, InfinityError};
use std::sync::Arc;
use std::time::Duration;

async fn eventually<T>(mut check: impl FnMut() -> Option<T>) -> T {
    for _ in 0..1000 {
        if let Some(value) = check() {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 5s");
}

fn report(src: u16, payload: Vec<u8>) -> InfinityFrame {
    InfinityFrame::new(src, DEVICE_THERMOSTAT, Op::Ack06, payload)
}

fn start() -> (Gateway, Arc<MockSerialPort>) {
    let (port, mock) = MockSerialPort::pair();
    let gateway = Gateway::from_port(port, &BusConfig::default()).unwrap();
    (gateway, mock)
}

#[tokio::test]
async fn test_heat_pump_telemetry() {
    let (gateway, mock) = start();
    let state = gateway.state();

    mock.inject_raw(&decode_hex("20 01 50 01 07 00 00 06 00 3e 01 02 80 01 00 bf ca").unwrap())
        .await
        .unwrap();
    assert!(state.get_heat_pump_state().is_none());

    mock.inject(&report(DEVICE_HEAT_PUMP, vec![0x00, 0x3e, 0x02, 0x05]))
        .await
        .unwrap();

    let hp = eventually(|| state.get_heat_pump_state()).await;
    assert_eq!(hp.outside_temp, 40.0);
    assert_eq!(hp.coil_temp, 16.0);
    assert_eq!(hp.stage, 2);

    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_air_handler_telemetry() {
    let (gateway, mock) = start();
    let state = gateway.state();

    mock.inject(&report(DEVICE_AIR_HANDLER, vec![0x00, 0x03, 0x06, 0x00, 0x03, 0x84]))
        .await
        .unwrap();
    mock.inject_raw(
        &decode_hex("20 01 40 01 09 00 00 06 00 03 16 01 00 00 00 02 58 53 e2").unwrap(),
    )
    .await
    .unwrap();

    let ah = eventually(|| state.get_air_handler_state()).await;
    assert_eq!(ah.blower_rpm, 900);
    assert_eq!(ah.air_flow_cfm, 600);
    assert!(ah.elec_heat);

    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_traffic_outside_windows_is_ignored() {
    let (gateway, mock) = start();
    let state = gateway.state();

    // Right discriminator, wrong source.
    mock.inject(&report(0x6001, vec![0x00, 0x3e, 0x02, 0x05])).await.unwrap();
    // Right source, not a response.
    mock.inject(&InfinityFrame::new(
        DEVICE_HEAT_PUMP,
        DEVICE_THERMOSTAT,
        Op::WriteTable,
        vec![0x00, 0x3e, 0x01, 0x02, 0x80, 0x01, 0x00],
    ))
    .await
    .unwrap();
    // Sentinel that must be seen.
    mock.inject(&report(DEVICE_HEAT_PUMP, vec![0x00, 0x3e, 0x02, 0x05]))
        .await
        .unwrap();

    let cache = Arc::clone(state.cache());
    eventually(|| cache.get("heatpumpstage")).await;
    assert!(cache.get("heatpump").is_none());
    assert!(state.get_heat_pump_state().is_none());

    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_noise_between_reports_is_skipped() {
    let (gateway, mock) = start();
    let state = gateway.state();

    let mut bytes = vec![0x00];
    bytes.extend(
        report(DEVICE_HEAT_PUMP, vec![0x00, 0x3e, 0x01, 0x02, 0x80, 0x01, 0x00])
            .encode()
            .unwrap(),
    );
    bytes.push(0x00);
    bytes.extend(report(DEVICE_HEAT_PUMP, vec![0x00, 0x3e, 0x02, 0x02]).encode().unwrap());
    mock.inject_raw(&bytes).await.unwrap();

    let hp = eventually(|| state.get_heat_pump_state()).await;
    assert_eq!(hp.stage, 1);

    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_thermostat_is_polled() {
    let (gateway, mock) = start();
    let state: HvacState = gateway.state();

    let mut current = vec![0u8; TStatCurrentParams::LEN];
    current[0] = 71;
    current[8] = 45;
    current[17] = 38;
    current[19] = 0x25;
    let mut zone = vec![0u8; TStatZoneParams::LEN];
    zone[0] = 0;
    zone[8] = 0x01;
    zone[9] = 68;
    zone[17] = 76;
    mock.set_table(DEVICE_THERMOSTAT, TABLE_TSTAT_CURRENT_PARAMS, current);
    mock.set_table(DEVICE_THERMOSTAT, TABLE_TSTAT_ZONE_PARAMS, zone);
    Arc::clone(&mock).serve();

    let cfg = eventually(|| state.get_thermostat_config()).await;
    assert_eq!(cfg.current_temp, 71);
    assert_eq!(cfg.current_humidity, 45);
    assert_eq!(cfg.outdoor_temp, 38);
    assert_eq!(cfg.mode, "off");
    assert_eq!(cfg.stage, 1);
    assert_eq!(cfg.fan_mode, "auto");
    assert_eq!(cfg.hold, Some(true));
    assert_eq!(cfg.heat_setpoint, 68);
    assert_eq!(cfg.cool_setpoint, 76);
    assert_eq!(cfg.raw_mode, 0x25);

    gateway.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lost_link_closes_gateway_and_keeps_last_state() {
    let mut captured = report(DEVICE_AIR_HANDLER, vec![0x00, 0x03, 0x06, 0x00, 0x03, 0x84])
        .encode()
        .unwrap();
    captured.extend(decode_hex("20 01 40 01 09 00 00 06 00 03 16 01 00 00 00 02 58 53 e2").unwrap());
    let gateway = Gateway::from_port(FailingPort::new(captured), &BusConfig::default()).unwrap();
    let state = gateway.state();

    tokio::time::timeout(Duration::from_secs(1), gateway.closed())
        .await
        .expect("gateway did not notice the lost link");

    let ah = eventually(|| state.get_air_handler_state()).await;
    assert_eq!(ah.blower_rpm, 900);
    assert_eq!(ah.air_flow_cfm, 600);

    match gateway.shutdown().await {
        Err(InfinityError::Io(e)) => assert_eq!(e.to_string(), "device disconnected"),
        other => panic!("expected the link error, got {other:?}"),
    }
}
