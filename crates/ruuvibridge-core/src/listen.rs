//! Passive BLE listening for RuuviTag broadcasts.
//!
//! RuuviTags broadcast continuously; no connection is ever established. The
//! listener runs scan cycles on the host's Bluetooth adapter, picks out
//! advertisements carrying the Ruuvi manufacturer ID, decodes them, and
//! feeds the pipeline over a bounded channel.
//!
//! Tags rebroadcast the same measurement many times between measurements, so
//! readings are de-duplicated by measurement sequence number, with a max-age
//! override so a silent dashboard still refreshes when a tag's sequence
//! counter stalls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ruuvibridge_types::RuuviFrame;

use crate::advertisement::{MANUFACTURER_ID, parse_manufacturer_data};
use crate::error::{Error, Result};

/// One decoded broadcast, as handed to the pipeline.
#[derive(Debug, Clone)]
pub struct BeaconReading {
    /// Beacon address as reported by the BLE layer.
    pub address: String,
    /// Received signal strength, when the adapter reports it.
    pub rssi: Option<i16>,
    /// Decoded payload.
    pub frame: RuuviFrame,
}

/// Options for the beacon listener.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// How long each scan cycle runs.
    pub scan_duration: Duration,
    /// Delay between scan cycles.
    pub scan_interval: Duration,
    /// Capacity of the channel to the pipeline.
    pub channel_capacity: usize,
    /// Re-emit an unchanged reading after this long.
    pub max_reading_age: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(5),
            scan_interval: Duration::from_secs(1),
            channel_capacity: 100,
            max_reading_age: Duration::from_secs(60),
        }
    }
}

/// What we last emitted for an address, for de-duplication.
struct SeenEntry {
    sequence: Option<u16>,
    emitted_at: Instant,
}

/// Passive listener for RuuviTag advertisements.
pub struct BeaconListener {
    options: ListenerOptions,
    sender: mpsc::Sender<BeaconReading>,
    seen: Arc<Mutex<HashMap<String, SeenEntry>>>,
}

impl BeaconListener {
    /// Create a listener and the receiving end of its reading channel.
    pub fn channel(options: ListenerOptions) -> (Self, mpsc::Receiver<BeaconReading>) {
        let (sender, receiver) = mpsc::channel(options.channel_capacity);
        (
            Self {
                options,
                sender,
                seen: Arc::new(Mutex::new(HashMap::new())),
            },
            receiver,
        )
    }

    /// Start listening in a background task.
    ///
    /// The task runs scan cycles until the cancellation token is triggered.
    /// Scan errors are logged and the next cycle retried; the BLE stack
    /// recovering (adapter replug, bluetoothd restart) resumes listening
    /// without intervention.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("starting beacon listener");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("beacon listener cancelled");
                        break;
                    }
                    result = self.scan_cycle() => {
                        if let Err(e) = result {
                            warn!("beacon scan error: {}", e);
                        }
                        sleep(self.options.scan_interval).await;
                    }
                }
            }
        })
    }

    /// Run one scan cycle and emit any fresh readings.
    async fn scan_cycle(&self) -> Result<()> {
        let adapter = get_adapter().await?;

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(self.options.scan_duration).await;
        adapter.stop_scan().await?;

        let peripherals = adapter.peripherals().await?;

        for peripheral in peripherals {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let Some(data) = props.manufacturer_data.get(&MANUFACTURER_ID) else {
                continue;
            };

            let address = props.address.to_string();
            match parse_manufacturer_data(data) {
                Ok(frame) => {
                    if !self.should_emit(&address, &frame) {
                        continue;
                    }
                    let reading = BeaconReading {
                        address: address.clone(),
                        rssi: props.rssi,
                        frame,
                    };
                    // The pipeline is the single consumer; if it cannot keep
                    // up, dropping a rebroadcast is cheaper than stalling
                    // the scan loop.
                    if let Err(e) = self.sender.try_send(reading) {
                        warn!("reading channel full, dropping broadcast from {}: {}", address, e);
                    }
                }
                Err(e) => {
                    debug!("undecodable Ruuvi advertisement from {}: {}", address, e);
                }
            }
        }

        Ok(())
    }

    /// Decide whether a decoded frame is new enough to emit.
    fn should_emit(&self, address: &str, frame: &RuuviFrame) -> bool {
        let mut seen = self.seen.lock().expect("seen map lock poisoned");
        let now = Instant::now();

        let fresh = match seen.get(address) {
            Some(entry) => {
                entry.emitted_at.elapsed() > self.options.max_reading_age
                    || entry.sequence != frame.measurement_sequence_number
                    || frame.measurement_sequence_number.is_none()
            }
            None => true,
        };

        if fresh {
            seen.insert(
                address.to_string(),
                SeenEntry {
                    sequence: frame.measurement_sequence_number,
                    emitted_at: now,
                },
            );
        }
        fresh
    }
}

/// First available Bluetooth adapter on this host.
async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_sequence(sequence: Option<u16>) -> RuuviFrame {
        RuuviFrame {
            data_format: 5,
            temperature: Some(20.0),
            humidity: None,
            pressure: None,
            acceleration: None,
            acceleration_x: None,
            acceleration_y: None,
            acceleration_z: None,
            tx_power: None,
            battery: None,
            movement_counter: None,
            measurement_sequence_number: sequence,
            mac: None,
        }
    }

    #[test]
    fn test_first_sighting_emits() {
        let (listener, _rx) = BeaconListener::channel(ListenerOptions::default());
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(1))));
    }

    #[test]
    fn test_repeated_sequence_is_suppressed() {
        let (listener, _rx) = BeaconListener::channel(ListenerOptions::default());
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(7))));
        assert!(!listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(7))));
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(8))));
    }

    #[test]
    fn test_missing_sequence_always_emits() {
        let (listener, _rx) = BeaconListener::channel(ListenerOptions::default());
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(None)));
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(None)));
    }

    #[test]
    fn test_stale_reading_reemits() {
        let (listener, _rx) = BeaconListener::channel(ListenerOptions {
            max_reading_age: Duration::ZERO,
            ..ListenerOptions::default()
        });
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(7))));
        std::thread::sleep(Duration::from_millis(5));
        assert!(listener.should_emit("AA:BB:CC:DD:EE:FF", &frame_with_sequence(Some(7))));
    }

    #[test]
    fn test_addresses_tracked_independently() {
        let (listener, _rx) = BeaconListener::channel(ListenerOptions::default());
        assert!(listener.should_emit("AA:AA:AA:AA:AA:AA", &frame_with_sequence(Some(7))));
        assert!(listener.should_emit("BB:BB:BB:BB:BB:BB", &frame_with_sequence(Some(7))));
    }
}
