//! Scanner abstraction over the platform BLE stack.
//!
//! The scheduler and service only ever talk to [`BeaconScanner`];
//! [`MockScanner`] backs the tests and demos, and a btleplug-backed
//! implementation lives in [`crate::ble_scanner`] behind the `ble`
//! feature.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::{ScanError, ScanResult};

pub type AdvertisementStream = BoxStream<'static, Advertisement>;

/// One raw advertisement as delivered by the radio. The payload is
/// opaque here; decoding happens in `aero-beacon`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub address: [u8; 6],
    pub rssi: i8,
    pub data: Vec<u8>,
}

impl Advertisement {
    pub fn address_string(&self) -> String {
        self.address
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

#[async_trait]
pub trait BeaconScanner: Send + Sync {
    /// Checks that the underlying adapter exists and is enabled.
    async fn ensure_ready(&self) -> ScanResult<()>;

    async fn start_scan(&mut self) -> ScanResult<()>;
    async fn stop_scan(&mut self) -> ScanResult<()>;

    /// Stream of raw advertisements. Only delivers while a scan window
    /// is open.
    fn advertisement_stream(&self) -> AdvertisementStream;
}

/// Scan-window transitions recorded by [`MockScanner`], with the
/// instant they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Opened(Instant),
    Closed(Instant),
}

pub struct MockScanner {
    scanning: bool,
    available: bool,
    tx: broadcast::Sender<Advertisement>,
    window_log: Arc<Mutex<Vec<WindowEvent>>>,
}

impl MockScanner {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            scanning: false,
            available: true,
            tx,
            window_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A scanner whose adapter reports as missing.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Delivers a raw advertisement to every stream subscriber,
    /// regardless of window state. Window gating is the radio's job;
    /// tests drive it explicitly.
    pub fn inject(&self, advertisement: Advertisement) {
        let _ = self.tx.send(advertisement);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn window_log(&self) -> Vec<WindowEvent> {
        self.window_log.lock().clone()
    }

    /// Handle for injecting and inspecting after the scanner has been
    /// moved into a scheduler or service.
    pub fn probe(&self) -> MockScannerProbe {
        MockScannerProbe {
            tx: self.tx.clone(),
            window_log: Arc::clone(&self.window_log),
        }
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable side-channel into a [`MockScanner`].
#[derive(Clone)]
pub struct MockScannerProbe {
    tx: broadcast::Sender<Advertisement>,
    window_log: Arc<Mutex<Vec<WindowEvent>>>,
}

impl MockScannerProbe {
    pub fn inject(&self, advertisement: Advertisement) {
        let _ = self.tx.send(advertisement);
    }

    pub fn window_log(&self) -> Vec<WindowEvent> {
        self.window_log.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.window_log
            .lock()
            .iter()
            .filter(|e| matches!(e, WindowEvent::Opened(_)))
            .count()
    }
}

#[async_trait]
impl BeaconScanner for MockScanner {
    async fn ensure_ready(&self) -> ScanResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(ScanError::AdapterNotAvailable)
        }
    }

    async fn start_scan(&mut self) -> ScanResult<()> {
        if !self.available {
            return Err(ScanError::AdapterNotAvailable);
        }
        if self.scanning {
            return Err(ScanError::ScanInProgress);
        }
        self.scanning = true;
        self.window_log.lock().push(WindowEvent::Opened(Instant::now()));
        tracing::debug!("MockScanner: scan window opened");
        Ok(())
    }

    async fn stop_scan(&mut self) -> ScanResult<()> {
        if !self.scanning {
            return Err(ScanError::NotScanning);
        }
        self.scanning = false;
        self.window_log.lock().push(WindowEvent::Closed(Instant::now()));
        tracing::debug!("MockScanner: scan window closed");
        Ok(())
    }

    fn advertisement_stream(&self) -> AdvertisementStream {
        let mut rx = self.tx.subscribe();
        Box::pin(async_stream::stream! {
            while let Ok(advertisement) = rx.recv().await {
                yield advertisement;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn adv(data: Vec<u8>) -> Advertisement {
        Advertisement {
            address: [0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22],
            rssi: -60,
            data,
        }
    }

    #[test]
    fn test_address_string() {
        assert_eq!(adv(vec![]).address_string(), "AA:BB:CC:00:11:22");
    }

    #[tokio::test]
    async fn test_start_stop_scan_state() {
        let mut scanner = MockScanner::new();
        assert!(scanner.ensure_ready().await.is_ok());

        scanner.start_scan().await.unwrap();
        assert!(scanner.is_scanning());
        assert!(matches!(
            scanner.start_scan().await,
            Err(ScanError::ScanInProgress)
        ));

        scanner.stop_scan().await.unwrap();
        assert!(!scanner.is_scanning());
        assert!(matches!(
            scanner.stop_scan().await,
            Err(ScanError::NotScanning)
        ));
    }

    #[tokio::test]
    async fn test_unavailable_adapter() {
        let mut scanner = MockScanner::unavailable();
        assert!(matches!(
            scanner.ensure_ready().await,
            Err(ScanError::AdapterNotAvailable)
        ));
        assert!(matches!(
            scanner.start_scan().await,
            Err(ScanError::AdapterNotAvailable)
        ));
    }

    #[tokio::test]
    async fn test_injected_advertisements_reach_stream() {
        let scanner = MockScanner::new();
        let mut stream = scanner.advertisement_stream();

        scanner.inject(adv(vec![1, 2, 3]));
        let got = stream.next().await.unwrap();
        assert_eq!(got.data, vec![1, 2, 3]);
    }
}
