//! Sensor identity: the room/label a beacon address resolves to.

use serde::{Deserialize, Serialize};

/// The resolved identity of one physical sensor.
///
/// Created the first time a reading from an address is processed and stable
/// for the process lifetime. Identities are not persisted; a restart resolves
/// every address again from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIdentity {
    /// The raw beacon address as delivered by the BLE layer.
    pub raw_address: String,
    /// Human-readable room/location label, configured or synthesized.
    pub label: String,
    /// True when the label was synthesized because the address is unmapped.
    pub auto_generated: bool,
}

impl SensorIdentity {
    /// Identity for an address found in the configured mapping.
    pub fn mapped(raw_address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            raw_address: raw_address.into(),
            label: label.into(),
            auto_generated: false,
        }
    }

    /// Identity with a synthesized fallback label.
    pub fn generated(raw_address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            raw_address: raw_address.into(),
            label: label.into(),
            auto_generated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_constructors() {
        let mapped = SensorIdentity::mapped("AA:BB:CC:DD:EE:FF", "living_room");
        assert!(!mapped.auto_generated);
        assert_eq!(mapped.label, "living_room");

        let generated = SensorIdentity::generated("AA:BB:CC:DD:EE:FF", "Sensor-AABBCCDDEEFF");
        assert!(generated.auto_generated);
        assert_eq!(generated.raw_address, "AA:BB:CC:DD:EE:FF");
    }
}
