//! Runs the beacon listening pipeline against a mock scanner that
//! broadcasts synthetic ozone readings, printing every accepted
//! measurement and connection event.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, Level};

use aero_beacon::GeoPoint;
use aero_node::{
    Advertisement, BeaconListeningService, FixedLocation, MockAlertSink, MockScanner, NodeConfig,
    NullUplink,
};

const TARGET: &str = "AERO-DEMO-NODE-1";

fn frame_bytes(uuid: &str, major: u16, minor: u16) -> Vec<u8> {
    let mut bytes = vec![0x02, 0x01, 0x06, 0x1A, 0xFF, 0x4C, 0x00, 0x02, 0x15];
    bytes.extend_from_slice(uuid.as_bytes());
    bytes.extend_from_slice(&major.to_be_bytes());
    bytes.extend_from_slice(&minor.to_be_bytes());
    bytes.push(0xC5);
    bytes
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let scanner = MockScanner::new();
    let probe = scanner.probe();

    let service = BeaconListeningService::new(
        scanner,
        MockAlertSink::new(),
        Arc::new(FixedLocation(GeoPoint::new(39.4699, -0.3763))),
        Arc::new(NullUplink),
        NodeConfig::new(TARGET),
    );

    service.initialize().expect("valid default config");
    let mut measurements = service.subscribe_measurements();
    let mut events = service.subscribe_connection_events();
    service.start(TARGET).await.expect("mock adapter available");

    // Synthetic beacon: one reading every two seconds, occasionally
    // spiking past the danger threshold.
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;
            let o3 = {
                let mut rng = rand::thread_rng();
                if rng.gen_bool(0.1) {
                    rng.gen_range(101..200)
                } else {
                    rng.gen_range(20..90)
                }
            };
            probe.inject(Advertisement {
                address: [0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22],
                rssi: -58,
                data: frame_bytes(TARGET, o3, 25),
            });
        }
    });

    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "connection event");
        }
    });

    let run_for = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(run_for);

    loop {
        tokio::select! {
            Some(m) = measurements.recv() => {
                info!(o3 = m.o3_value, lat = m.latitude, lon = m.longitude, "measurement");
            }
            _ = &mut run_for => break,
        }
    }

    service.stop().await;
    info!(stats = ?service.stats(), "demo finished");
}
