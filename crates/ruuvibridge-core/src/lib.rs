//! Core pipeline for the RuuviTag MQTT gateway.
//!
//! This crate contains everything between the Bluetooth adapter and the
//! broker transport:
//!
//! - **Listening**: passive BLE scanning for RuuviTag broadcasts
//!   ([`listen`]) and RAWv2 payload decoding ([`advertisement`])
//! - **Identity**: mapping beacon addresses to room labels, with generated
//!   fallbacks and the unknown-sensor log ([`identity`])
//! - **Discovery state**: the published-label cache ([`discovery`]) and the
//!   resend policy that invalidates it ([`resend`]), fed by broker lifecycle
//!   events ([`events`])
//! - **The pipeline**: per-reading orchestration of all of the above
//!   ([`pipeline`]), publishing through the [`Publisher`] seam
//!
//! The broker transport itself lives in `ruuvibridge-mqtt`; this crate only
//! sees it as a [`Publisher`] plus a stream of [`BrokerEvent`]s.
//!
//! # Concurrency model
//!
//! One task consumes readings and runs the pipeline sequentially. Broker
//! lifecycle events arrive concurrently from per-endpoint I/O tasks and are
//! serialized through short mutex sections inside [`DiscoveryCache`] and
//! [`ResendScheduler`]; no lock is ever held across a publish.

pub mod advertisement;
pub mod discovery;
pub mod error;
pub mod events;
pub mod identity;
pub mod listen;
pub mod pipeline;
pub mod publish;
pub mod resend;

pub use advertisement::{DATA_FORMAT_RAW_V2, MANUFACTURER_ID, parse_manufacturer_data};
pub use discovery::DiscoveryCache;
pub use error::{Error, Result};
pub use events::{BrokerEvent, HUB_ONLINE_PAYLOAD, dispatch_broker_event};
pub use identity::IdentityResolver;
pub use listen::{BeaconListener, BeaconReading, ListenerOptions};
pub use pipeline::{FieldMap, PipelineOptions, ReadingPipeline};
pub use publish::Publisher;
pub use resend::{DEFAULT_RESEND_INTERVAL, ExternalEvent, ResendScheduler};
