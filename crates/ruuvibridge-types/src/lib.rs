//! Platform-agnostic types for the RuuviTag MQTT gateway.
//!
//! This crate holds the value types shared between the beacon decoder, the
//! publishing pipeline, and the service binary:
//!
//! - [`RuuviFrame`]: a decoded RuuviTag RAWv2 broadcast
//! - [`SensorIdentity`]: the resolved room/label for a beacon address
//! - [`FieldSpec`] / [`declared_fields`]: the fixed table of field classes a
//!   RuuviTag is described with in discovery metadata
//! - [`DiscoveryPayload`]: the retained per-field discovery message consumed
//!   by a home-automation hub
//!
//! No I/O happens here; everything is plain data with `serde` derives.

pub mod discovery;
pub mod error;
pub mod fields;
pub mod frame;
pub mod identity;

pub use discovery::{DeviceBlock, DiscoveryPayload};
pub use error::ParseError;
pub use fields::{FieldSpec, declared_fields};
pub use frame::RuuviFrame;
pub use identity::SensorIdentity;
