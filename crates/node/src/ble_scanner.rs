//! btleplug-backed scanner implementation.
//!
//! Only available with the `ble` feature on platforms with native
//! Bluetooth hardware. The radio surfaces iBeacon frames as Apple
//! manufacturer data; the 5-byte advertising header stripped by the
//! platform stack is reconstructed so the decoder sees the same
//! 30-byte layout the beacon broadcasts.

use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{ScanError, ScanResult};
use crate::scanner::{Advertisement, AdvertisementStream, BeaconScanner};

/// Apple company identifier carried by iBeacon frames.
const IBEACON_COMPANY_ID: u16 = 0x004C;

/// Manufacturer payload of an iBeacon: type, length, uuid, major,
/// minor, tx power.
const IBEACON_PAYLOAD_LEN: usize = 23;

pub struct BtleScanner {
    adapter: Arc<Adapter>,
    scanning: bool,
}

impl BtleScanner {
    /// Binds to the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::AdapterNotAvailable`] when the host has no
    /// usable adapter, [`ScanError::Hardware`] when the platform stack
    /// fails to initialize.
    pub async fn new() -> ScanResult<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| ScanError::Hardware(format!("failed to create BLE manager: {e}")))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| ScanError::Hardware(format!("failed to enumerate adapters: {e}")))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(ScanError::AdapterNotAvailable)?;

        info!(
            adapter_info = ?adapter.adapter_info().await,
            "BLE scanner initialized"
        );

        Ok(Self {
            adapter: Arc::new(adapter),
            scanning: false,
        })
    }

    /// Rebuilds the on-air frame layout from manufacturer data: flags,
    /// advertising header, company id, then the 23-byte payload.
    fn rebuild_frame(company_id: u16, payload: &[u8]) -> Option<Vec<u8>> {
        if company_id != IBEACON_COMPANY_ID || payload.len() < IBEACON_PAYLOAD_LEN {
            return None;
        }

        let mut frame = Vec::with_capacity(7 + payload.len());
        frame.extend_from_slice(&[0x02, 0x01, 0x06, 0x1A, 0xFF]);
        frame.extend_from_slice(&company_id.to_le_bytes());
        frame.extend_from_slice(payload);
        Some(frame)
    }
}

#[async_trait]
impl BeaconScanner for BtleScanner {
    async fn ensure_ready(&self) -> ScanResult<()> {
        self.adapter
            .adapter_info()
            .await
            .map(|_| ())
            .map_err(|_| ScanError::AdapterNotAvailable)
    }

    async fn start_scan(&mut self) -> ScanResult<()> {
        if self.scanning {
            return Err(ScanError::ScanInProgress);
        }
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| ScanError::Hardware(format!("start_scan failed: {e}")))?;
        self.scanning = true;
        debug!("BLE scan window opened");
        Ok(())
    }

    async fn stop_scan(&mut self) -> ScanResult<()> {
        if !self.scanning {
            return Err(ScanError::NotScanning);
        }
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| ScanError::Hardware(format!("stop_scan failed: {e}")))?;
        self.scanning = false;
        debug!("BLE scan window closed");
        Ok(())
    }

    fn advertisement_stream(&self) -> AdvertisementStream {
        let adapter = Arc::clone(&self.adapter);
        Box::pin(async_stream::stream! {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "BLE event stream unavailable");
                    return;
                }
            };

            while let Some(event) = events.next().await {
                if let CentralEvent::ManufacturerDataAdvertisement {
                    manufacturer_data, ..
                } = event
                {
                    for (company_id, payload) in &manufacturer_data {
                        if let Some(data) = Self::rebuild_frame(*company_id, payload) {
                            // The platform stack does not expose the MAC
                            // or RSSI on this event; identity filtering
                            // happens on the decoded UUID region anyway.
                            yield Advertisement {
                                address: [0u8; 6],
                                rssi: 0,
                                data,
                            };
                        }
                    }
                }
            }
        })
    }
}
