//! Discovery metadata payloads.
//!
//! A retained discovery message is published per sensor and field class so a
//! late-joining home-automation hub can auto-create a dashboard entity for it.

use serde::{Deserialize, Serialize};

use crate::fields::FieldSpec;

/// Device description embedded in every discovery payload.
///
/// All fields of one sensor share the same block, which is how the hub groups
/// the entities under a single device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBlock {
    /// Stable identifiers for the device; the label alone suffices here.
    pub identifiers: Vec<String>,
    /// Display name, same as the label.
    pub name: String,
    /// Hardware manufacturer.
    pub manufacturer: String,
    /// Hardware model.
    pub model: String,
}

impl DeviceBlock {
    /// Device block for a labeled RuuviTag.
    pub fn for_label(label: &str) -> Self {
        Self {
            identifiers: vec![label.to_string()],
            name: label.to_string(),
            manufacturer: "Ruuvi".to_string(),
            model: "RuuviTag".to_string(),
        }
    }
}

/// One retained discovery message describing a single field of a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    /// Topic the enriched readings are published on.
    pub state_topic: String,
    /// Unit for the dashboard entity.
    pub unit_of_measurement: String,
    /// Template extracting this field from the reading JSON.
    pub value_template: String,
    /// Globally unique entity id, derived from the tag MAC and field name.
    pub unique_id: String,
    /// Entity id suggested to the hub.
    pub object_id: String,
    /// Entity display name.
    pub name: String,
    /// Owning device description.
    pub device: DeviceBlock,
    /// Hub device class, present only for quantities that have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

impl DiscoveryPayload {
    /// Build the payload for one field of a labeled sensor.
    ///
    /// `mac` is the tag MAC as it appears in readings (used for the unique
    /// id), `state_topic` the reading topic for this label.
    pub fn for_field(label: &str, mac: &str, state_topic: &str, field: &FieldSpec) -> Self {
        Self {
            state_topic: state_topic.to_string(),
            unit_of_measurement: field.unit.to_string(),
            value_template: format!("{{{{ value_json.{} }}}}", field.name),
            unique_id: format!("ruuvi{}{}", mac, field.name),
            object_id: format!("{}_{}", label, field.name),
            name: field.name.clone(),
            device: DeviceBlock::for_label(label),
            device_class: field.device_class.map(str::to_string),
        }
    }
}
