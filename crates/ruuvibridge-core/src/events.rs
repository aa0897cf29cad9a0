//! Broker lifecycle events.
//!
//! The broker transport surfaces connection lifecycle and inbound messages as
//! explicit tagged values instead of callbacks, so the core's invalidation
//! triggers stay decoupled from any concrete client library's callback shape.
//! A single dispatch function maps events onto the resend scheduler.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::resend::{ExternalEvent, ResendScheduler};

/// Payload the hub publishes on its status topic when it comes online.
pub const HUB_ONLINE_PAYLOAD: &[u8] = b"online";

/// Lifecycle events emitted by the broker transport.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// An endpoint completed a (re)connection handshake.
    Connected {
        /// Configured endpoint name.
        endpoint: String,
    },
    /// An endpoint lost its connection.
    Disconnected {
        /// Configured endpoint name.
        endpoint: String,
    },
    /// A subscribed message arrived on an endpoint.
    MessageReceived {
        /// Configured endpoint name.
        endpoint: String,
        /// Topic the message arrived on.
        topic: String,
        /// Raw message payload.
        payload: Vec<u8>,
    },
}

/// Route one broker event to the resend scheduler.
///
/// A completed (re)connection and a hub `"online"` announcement both force a
/// full discovery resend; everything else is just logged. Disconnections do
/// not invalidate: the client's own reconnect will, once it succeeds.
pub fn dispatch_broker_event(
    event: &BrokerEvent,
    hub_status_topic: &str,
    scheduler: &ResendScheduler,
) {
    match event {
        BrokerEvent::Connected { endpoint } => {
            info!("broker {} connected", endpoint);
            scheduler.on_event(ExternalEvent::BrokerReconnected, Instant::now());
        }
        BrokerEvent::Disconnected { endpoint } => {
            warn!("unexpected disconnection from broker {}", endpoint);
        }
        BrokerEvent::MessageReceived {
            endpoint,
            topic,
            payload,
        } => {
            if topic == hub_status_topic && payload == HUB_ONLINE_PAYLOAD {
                info!("hub status 'online' received from broker {}", endpoint);
                scheduler.on_event(ExternalEvent::HubLivenessOnline, Instant::now());
            } else {
                debug!(
                    "ignoring message on {} from broker {} ({} bytes)",
                    topic,
                    endpoint,
                    payload.len()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::discovery::DiscoveryCache;

    fn fixture() -> (Arc<DiscoveryCache>, ResendScheduler) {
        let cache = Arc::new(DiscoveryCache::new());
        let scheduler = ResendScheduler::new(Arc::clone(&cache), Duration::from_secs(3600));
        (cache, scheduler)
    }

    #[test]
    fn test_connected_invalidates() {
        let (cache, scheduler) = fixture();
        cache.mark_published("living_room");

        let event = BrokerEvent::Connected {
            endpoint: "local".to_string(),
        };
        dispatch_broker_event(&event, "homeassistant/status", &scheduler);
        assert!(cache.should_publish("living_room"));
    }

    #[test]
    fn test_disconnected_does_not_invalidate() {
        let (cache, scheduler) = fixture();
        cache.mark_published("living_room");

        let event = BrokerEvent::Disconnected {
            endpoint: "local".to_string(),
        };
        dispatch_broker_event(&event, "homeassistant/status", &scheduler);
        assert!(!cache.should_publish("living_room"));
    }

    #[test]
    fn test_hub_online_message_invalidates() {
        let (cache, scheduler) = fixture();
        cache.mark_published("living_room");

        let event = BrokerEvent::MessageReceived {
            endpoint: "local".to_string(),
            topic: "homeassistant/status".to_string(),
            payload: b"online".to_vec(),
        };
        dispatch_broker_event(&event, "homeassistant/status", &scheduler);
        assert!(cache.should_publish("living_room"));
    }

    #[test]
    fn test_other_payload_is_ignored() {
        let (cache, scheduler) = fixture();
        cache.mark_published("living_room");

        let event = BrokerEvent::MessageReceived {
            endpoint: "local".to_string(),
            topic: "homeassistant/status".to_string(),
            payload: b"offline".to_vec(),
        };
        dispatch_broker_event(&event, "homeassistant/status", &scheduler);
        assert!(!cache.should_publish("living_room"));
    }

    #[test]
    fn test_other_topic_is_ignored() {
        let (cache, scheduler) = fixture();
        cache.mark_published("living_room");

        let event = BrokerEvent::MessageReceived {
            endpoint: "local".to_string(),
            topic: "some/other/topic".to_string(),
            payload: b"online".to_vec(),
        };
        dispatch_broker_event(&event, "homeassistant/status", &scheduler);
        assert!(!cache.should_publish("living_room"));
    }
}
