//! Integration tests for the polling supervisor.

mod common;

use common::FakeDevice;
use poseidon_supervisor::{Signal, Supervisor, SupervisorConfig, UpdateError, WaterSource};
use std::time::Duration;

fn config(extra: &str) -> SupervisorConfig {
    let json = format!(
        r#"{{
            device: {{
                name: "serre",
                host: "127.0.0.1",
                variant: "simulator",
                retry_delay_ms: 1,
            }},
            {}
        }}"#,
        extra
    );
    SupervisorConfig::parse(&json).unwrap()
}

#[test]
fn test_connect_without_retries_fails_once() {
    let device = FakeDevice::new();
    device.refuse_connections(1);

    let mut supervisor = Supervisor::with_connector(&config(""), device.clone()).unwrap();
    assert!(supervisor.connect().is_err());
    assert_eq!(device.state().connect_attempts, 1);
}

#[test]
fn test_connect_retries_are_bounded() {
    let device = FakeDevice::new();
    device.refuse_connections(5);

    let mut config = config("");
    config.device.connect_retries = 2;

    let mut supervisor = Supervisor::with_connector(&config, device.clone()).unwrap();
    assert!(supervisor.connect().is_err());
    assert_eq!(device.state().connect_attempts, 3);
    assert!(!supervisor.session().is_connected());
}

#[test]
fn test_connect_retry_succeeds() {
    let device = FakeDevice::new();
    device.refuse_connections(2);

    let mut config = config("");
    config.device.connect_retries = 3;

    let mut supervisor = Supervisor::with_connector(&config, device.clone()).unwrap();
    supervisor.connect().unwrap();
    assert!(supervisor.session().is_connected());
    assert_eq!(device.state().connect_attempts, 3);
}

#[test]
fn test_run_cycles_without_control() {
    let device = FakeDevice::new();
    device.set_holding(5, 18);
    device.set_holding(1, 250);
    device.set_discrete(100, true);

    let mut supervisor = Supervisor::with_connector(
        &config("control: { litres_per_pulse: 2.0 }"),
        device.clone(),
    )
    .unwrap();
    supervisor.connect().unwrap();

    let last = supervisor.run(3, Duration::ZERO).unwrap().unwrap();
    // Three sensor reads per cycle.
    assert_eq!(device.request_count(), 9);

    assert_eq!(last.snapshot.temperature_celsius, 18.0);
    assert!(last.snapshot.tank_full);
    assert_eq!(last.snapshot.pulse_count, 250);
    assert_eq!(last.consumption_litres, 500.0);
    assert!(last.stale.is_empty());
    assert_eq!(last.water_source, None);
    assert_eq!(last.pump_on, None);
    assert!(device.state().coil_writes.is_empty());

    supervisor.shutdown();
    assert!(!supervisor.session().is_connected());
}

#[test]
fn test_run_without_connect_fails() {
    let device = FakeDevice::new();
    let mut supervisor = Supervisor::with_connector(&config(""), device.clone()).unwrap();

    assert!(supervisor.run(2, Duration::ZERO).is_err());
    assert_eq!(device.request_count(), 0);
}

#[test]
fn test_run_huge_cycle_count_fails_fast_when_disconnected() {
    let device = FakeDevice::new();
    let mut supervisor = Supervisor::with_connector(&config(""), device.clone()).unwrap();

    assert!(matches!(
        supervisor.run(u32::MAX, Duration::from_secs(60)),
        Err(UpdateError::NotConnected)
    ));
    assert_eq!(device.request_count(), 0);
}

#[test]
fn test_run_zero_cycles() {
    let device = FakeDevice::new();
    let mut supervisor = Supervisor::with_connector(&config(""), device.clone()).unwrap();
    supervisor.connect().unwrap();

    assert_eq!(supervisor.run(0, Duration::ZERO).unwrap(), None);
    assert_eq!(device.request_count(), 0);
}

#[test]
fn test_control_uses_rainwater_when_safe() {
    let device = FakeDevice::new();
    device.set_holding(5, 12);
    device.set_discrete(100, true);

    let mut supervisor = Supervisor::with_connector(
        &config("control: { enabled: true, irrigation_demand: true }"),
        device.clone(),
    )
    .unwrap();
    supervisor.connect().unwrap();

    let outcome = supervisor.run_cycle().unwrap();
    assert_eq!(outcome.water_source, Some(WaterSource::Rainwater));
    assert_eq!(outcome.pump_on, Some(true));
    assert_eq!(device.state().coil_writes, vec![(152, true), (151, true)]);
}

#[test]
fn test_control_falls_back_to_municipal_on_frost() {
    let device = FakeDevice::new();
    device.set_holding(5, (-2i16) as u16);
    device.set_discrete(100, true);

    let mut supervisor = Supervisor::with_connector(
        &config("control: { enabled: true, irrigation_demand: true }"),
        device.clone(),
    )
    .unwrap();
    supervisor.connect().unwrap();

    let outcome = supervisor.run_cycle().unwrap();
    assert_eq!(outcome.water_source, Some(WaterSource::Municipal));
    assert_eq!(outcome.pump_on, Some(false));
    assert_eq!(device.state().coil_writes, vec![(152, false), (151, false)]);
}

#[test]
fn test_cycle_reports_stale_signals_and_failed_writes() {
    let device = FakeDevice::new();
    device.set_holding(5, 20);
    device.fail_read("discrete", 100);
    device.fail_write(152);

    let mut supervisor = Supervisor::with_connector(
        &config("control: { enabled: true }"),
        device.clone(),
    )
    .unwrap();
    supervisor.connect().unwrap();

    let outcome = supervisor.run_cycle().unwrap();
    assert_eq!(outcome.stale, vec![Signal::TankFull]);
    assert_eq!(outcome.snapshot.temperature_celsius, 20.0);
    assert_eq!(outcome.failed_writes, vec![Signal::SourceValve]);
    // The pump write still went out after the valve write failed.
    assert_eq!(device.state().coil_writes, vec![(151, false)]);
}
