//! Multi-broker MQTT fanout for the RuuviTag gateway.
//!
//! Holds one `rumqttc` client per configured broker endpoint and publishes
//! every message to all of them. Endpoints are independent: each runs its own
//! event-loop task, reconnects on its own, and a failing endpoint never
//! blocks the others. Connection lifecycle and inbound hub-status messages
//! surface as [`BrokerEvent`] values on a channel the service routes to the
//! resend scheduler.
//!
//! # Reconnection
//!
//! `rumqttc` reconnects automatically on the next event-loop poll after an
//! error; the fanout just logs, emits a `Disconnected` event, and backs off
//! briefly before polling again. Every successful (re)connection re-subscribes
//! to the hub-status topic and emits `Connected`.

mod fanout;

pub use fanout::{BrokerEndpoint, BrokerFanout, FanoutError, FanoutOptions};
