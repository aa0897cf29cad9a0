//! ruuvibridge - RuuviTag to MQTT gateway daemon.
//!
//! Listens for RuuviTag BLE broadcasts and republishes each reading as JSON
//! to every configured MQTT broker, keeping retained discovery metadata fresh
//! so a home-automation hub can auto-configure dashboards for each tag.
//!
//! Run with: `ruuvibridge` (add `-s` for per-field fan-out). Configuration
//! comes from `RUUVIBRIDGE_CONFIG` or the default config directory.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ruuvibridge_core::{
    BeaconListener, BeaconReading, DiscoveryCache, FieldMap, IdentityResolver, ListenerOptions,
    PipelineOptions, Publisher, ReadingPipeline, ResendScheduler, dispatch_broker_event,
};
use ruuvibridge_mqtt::{BrokerEndpoint, BrokerFanout, FanoutOptions};

mod config;

use config::Config;

/// RuuviTag to MQTT gateway.
#[derive(Parser, Debug)]
#[command(name = "ruuvibridge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Additionally publish every field to its own <label>/<field> topic.
    #[arg(short = 's', long)]
    single_values: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ruuvibridge=info".parse()?)
                .add_directive("ruuvibridge_core=info".parse()?)
                .add_directive("ruuvibridge_mqtt=info".parse()?),
        )
        .init();

    let config = Config::load_startup()?;

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "ruuvibridge".to_string());

    let cancel = CancellationToken::new();

    // Broker fanout with its lifecycle event channel.
    let endpoints: Vec<BrokerEndpoint> = config
        .brokers
        .iter()
        .map(|(name, broker)| BrokerEndpoint {
            name: name.clone(),
            host: broker.host.clone(),
            port: broker.port,
        })
        .collect();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let fanout = BrokerFanout::connect(
        &endpoints,
        FanoutOptions {
            client_id: format!("{hostname}-ruuvibridge"),
            keep_alive: Duration::from_secs(config.gateway.keep_alive_secs),
            qos: config.gateway.qos,
            hub_status_topic: config.gateway.hub_status_topic.clone(),
            ..FanoutOptions::default()
        },
        event_tx,
        cancel.clone(),
    )?;

    // Core state and the pipeline.
    let cache = Arc::new(DiscoveryCache::new());
    let scheduler = Arc::new(ResendScheduler::new(
        Arc::clone(&cache),
        Duration::from_secs(config.gateway.resend_interval_secs),
    ));
    let resolver = IdentityResolver::new(
        config.sensors.clone().into_iter().collect(),
        &config.gateway.unknown_sensor_log,
    );
    let pipeline = Arc::new(ReadingPipeline::new(
        resolver,
        Arc::clone(&cache),
        Arc::clone(&scheduler),
        Arc::new(fanout) as Arc<dyn Publisher>,
        PipelineOptions::new(&hostname)
            .reading_topic_prefix(&config.gateway.reading_topic_prefix)
            .discovery_topic_prefix(&config.gateway.discovery_topic_prefix)
            .single_values(args.single_values),
    ));

    // Broker lifecycle events drive the resend policy.
    let hub_status_topic = config.gateway.hub_status_topic.clone();
    let dispatch_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            dispatch_broker_event(&event, &hub_status_topic, &dispatch_scheduler);
        }
    });

    tokio::spawn(silence_watchdog(
        Arc::clone(&pipeline),
        Duration::from_secs(config.gateway.silence_warning_secs),
        cancel.clone(),
    ));

    // Beacon listener feeding the pipeline.
    let (listener, mut readings) = BeaconListener::channel(ListenerOptions {
        scan_duration: Duration::from_secs(config.gateway.scan_duration_secs),
        scan_interval: Duration::from_secs(config.gateway.scan_interval_secs),
        ..ListenerOptions::default()
    });
    let listener_handle = Arc::new(listener).start(cancel.clone());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    info!(
        "ruuvibridge started on {} ({} broker(s), {} mapped sensor(s), single values: {})",
        hostname,
        endpoints.len(),
        config.sensors.len(),
        args.single_values
    );

    // The single consumer of the reading stream.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            reading = readings.recv() => match reading {
                Some(reading) => {
                    let address = reading.address.clone();
                    match reading_fields(reading) {
                        Some(fields) => pipeline.process(&address, fields).await,
                        None => warn!("dropping unrepresentable reading from {}", address),
                    }
                }
                None => break,
            }
        }
    }

    let _ = listener_handle.await;
    info!("ruuvibridge stopped");
    Ok(())
}

/// Flatten a beacon reading into the pipeline's field map.
fn reading_fields(reading: BeaconReading) -> Option<FieldMap> {
    let serde_json::Value::Object(mut fields) = serde_json::to_value(&reading.frame).ok()? else {
        return None;
    };
    if let Some(rssi) = reading.rssi {
        fields.insert("rssi".to_string(), serde_json::Value::from(rssi));
    }
    Some(fields)
}

/// Warn once per silence stretch when no readings arrive for `threshold`.
///
/// Gaps in the reading stream are normal (tags out of range, adapter hiccup);
/// this is an operator hint, never an error.
async fn silence_watchdog(
    pipeline: Arc<ReadingPipeline>,
    threshold: Duration,
    cancel: CancellationToken,
) {
    let check_interval = threshold.min(Duration::from_secs(60)).max(Duration::from_secs(1));
    let mut warned = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(check_interval) => {
                let age = pipeline.last_reading_age();
                if age > threshold {
                    if !warned {
                        warn!("no sensor readings received for {} seconds", age.as_secs());
                        warned = true;
                    }
                } else {
                    warned = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruuvibridge_core::parse_manufacturer_data;

    #[test]
    fn test_reading_fields_includes_rssi() {
        let payload: [u8; 24] = [
            0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC,
            0x36, 0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
        ];
        let reading = BeaconReading {
            address: "CB:B8:33:4C:88:4F".to_string(),
            rssi: Some(-70),
            frame: parse_manufacturer_data(&payload).unwrap(),
        };

        let fields = reading_fields(reading).unwrap();
        assert_eq!(fields["rssi"], -70);
        assert_eq!(fields["temperature"], 24.3);
        assert_eq!(fields["mac"], "CB:B8:33:4C:88:4F");
        assert_eq!(fields["data_format"], 5);
    }

    #[test]
    fn test_reading_fields_without_rssi() {
        let payload: [u8; 24] = [
            0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC,
            0x36, 0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
        ];
        let reading = BeaconReading {
            address: "CB:B8:33:4C:88:4F".to_string(),
            rssi: None,
            frame: parse_manufacturer_data(&payload).unwrap(),
        };

        let fields = reading_fields(reading).unwrap();
        assert!(!fields.contains_key("rssi"));
    }

    #[test]
    fn test_args_parse_single_values_flag() {
        let args = Args::parse_from(["ruuvibridge"]);
        assert!(!args.single_values);

        let args = Args::parse_from(["ruuvibridge", "-s"]);
        assert!(args.single_values);

        let args = Args::parse_from(["ruuvibridge", "--single-values"]);
        assert!(args.single_values);
    }
}
