//! Broker connection bookkeeping and fan-out publishing.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ruuvibridge_core::{BrokerEvent, Error, Publisher};

/// One configured broker endpoint.
#[derive(Debug, Clone)]
pub struct BrokerEndpoint {
    /// Name from the configuration, used in logs and events.
    pub name: String,
    /// Broker hostname or IP.
    pub host: String,
    /// Broker port.
    pub port: u16,
}

/// Fanout behavior knobs.
#[derive(Debug, Clone)]
pub struct FanoutOptions {
    /// MQTT client id announced to every broker.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// QoS level for publishes and the hub-status subscription (0, 1 or 2).
    pub qos: u8,
    /// Topic the hub announces its liveness on.
    pub hub_status_topic: String,
    /// Pause after an event-loop error before polling again.
    pub reconnect_delay: Duration,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            client_id: "ruuvibridge".to_string(),
            keep_alive: Duration::from_secs(60),
            qos: 0,
            hub_status_topic: "homeassistant/status".to_string(),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Errors from fanout setup.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    /// The configuration declared no broker endpoints at all.
    #[error("no broker endpoints configured")]
    NoEndpoints,
}

struct EndpointHandle {
    name: String,
    client: AsyncClient,
}

/// Publishes to every configured broker endpoint.
pub struct BrokerFanout {
    endpoints: Vec<EndpointHandle>,
    qos: QoS,
}

impl BrokerFanout {
    /// Connect to every configured endpoint.
    ///
    /// Spawns one event-loop task per endpoint; lifecycle events go out on
    /// `events`. Connections are established (and re-established) in the
    /// background — this returns as soon as the clients exist, and an
    /// unreachable broker just keeps retrying. Must be called from within a
    /// Tokio runtime.
    pub fn connect(
        endpoints: &[BrokerEndpoint],
        options: FanoutOptions,
        events: mpsc::UnboundedSender<BrokerEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, FanoutError> {
        if endpoints.is_empty() {
            return Err(FanoutError::NoEndpoints);
        }

        let qos = qos_from_level(options.qos);
        let mut handles = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            info!(
                "connecting broker {} at {}:{}",
                endpoint.name, endpoint.host, endpoint.port
            );

            let mut mqtt_options =
                MqttOptions::new(&options.client_id, &endpoint.host, endpoint.port);
            mqtt_options.set_keep_alive(options.keep_alive);

            let (client, event_loop) = AsyncClient::new(mqtt_options, 100);

            tokio::spawn(run_event_loop(
                endpoint.name.clone(),
                client.clone(),
                event_loop,
                events.clone(),
                options.hub_status_topic.clone(),
                qos,
                options.reconnect_delay,
                cancel.clone(),
            ));

            handles.push(EndpointHandle {
                name: endpoint.name.clone(),
                client,
            });
        }

        Ok(Self {
            endpoints: handles,
            qos,
        })
    }

    /// Number of configured endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    #[cfg(test)]
    fn from_clients(clients: Vec<(String, AsyncClient)>, qos: QoS) -> Self {
        Self {
            endpoints: clients
                .into_iter()
                .map(|(name, client)| EndpointHandle { name, client })
                .collect(),
            qos,
        }
    }
}

#[async_trait]
impl Publisher for BrokerFanout {
    /// Publish to every endpoint, isolating per-endpoint failures.
    ///
    /// Errors only when every endpoint refused the message; a partial
    /// failure is logged and reported as success so one dead broker never
    /// blocks the rest.
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> ruuvibridge_core::Result<()> {
        let mut failures = 0;
        for endpoint in &self.endpoints {
            if let Err(e) = endpoint
                .client
                .publish(topic, self.qos, retain, payload.clone())
                .await
            {
                warn!(
                    "publish to {} via broker {} failed: {}",
                    topic, endpoint.name, e
                );
                failures += 1;
            }
        }

        if failures == self.endpoints.len() {
            return Err(Error::publish_failed(topic, failures));
        }
        Ok(())
    }
}

/// Drive one endpoint's event loop until cancellation.
#[allow(clippy::too_many_arguments)]
async fn run_event_loop(
    name: String,
    client: AsyncClient,
    mut event_loop: rumqttc::EventLoop,
    events: mpsc::UnboundedSender<BrokerEvent>,
    hub_status_topic: String,
    qos: QoS,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = client.disconnect().await {
                    debug!("error disconnecting broker {}: {}", name, e);
                }
                info!("broker {} event loop stopped", name);
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("broker {} connected: {:?}", name, ack.code);
                    if let Err(e) = client.subscribe(&hub_status_topic, qos).await {
                        warn!(
                            "broker {}: failed to subscribe {}: {}",
                            name, hub_status_topic, e
                        );
                    }
                    let _ = events.send(BrokerEvent::Connected {
                        endpoint: name.clone(),
                    });
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let _ = events.send(BrokerEvent::MessageReceived {
                        endpoint: name.clone(),
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::PingResp)) => {
                    debug!("broker {} ping response", name);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("broker {} connection error: {}. Reconnecting...", name, e);
                    let _ = events.send(BrokerEvent::Disconnected {
                        endpoint: name.clone(),
                    });
                    sleep(reconnect_delay).await;
                }
            }
        }
    }
}

/// Map a numeric QoS level onto the protocol enum.
fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}
