//! The declared field-class table for discovery metadata.
//!
//! Discovery metadata describes the sensor *type*, not one specific payload:
//! every RuuviTag is declared with the full table below even when a given
//! reading is missing some of the values.

/// One declared field class: the JSON key, its hub device class, and unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key in the reading JSON and suffix of the discovery topic.
    pub name: String,
    /// Hub device class, when one exists for this quantity.
    pub device_class: Option<&'static str>,
    /// Unit of measurement reported to the hub.
    pub unit: &'static str,
}

impl FieldSpec {
    fn new(name: impl Into<String>, device_class: Option<&'static str>, unit: &'static str) -> Self {
        Self {
            name: name.into(),
            device_class,
            unit,
        }
    }
}

/// The fixed table of field classes declared for every RuuviTag.
///
/// The signal-strength key is scoped to the receiving host so that several
/// gateways can report the same tag without clobbering each other's RSSI.
pub fn declared_fields(hostname: &str) -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("temperature", Some("temperature"), "°C"),
        FieldSpec::new("humidity", Some("humidity"), "%"),
        FieldSpec::new("pressure", Some("pressure"), "hPa"),
        FieldSpec::new("battery", Some("voltage"), "mV"),
        FieldSpec::new("acceleration", None, "mG"),
        FieldSpec::new("acceleration_x", None, "mG"),
        FieldSpec::new("acceleration_y", None, "mG"),
        FieldSpec::new("acceleration_z", None, "mG"),
        FieldSpec::new(format!("rssi_{hostname}"), None, "dBm"),
        FieldSpec::new("movement_counter", None, "times"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_fields_table() {
        let fields = declared_fields("gateway1");
        assert_eq!(fields.len(), 10);

        let temp = fields.iter().find(|f| f.name == "temperature").unwrap();
        assert_eq!(temp.device_class, Some("temperature"));
        assert_eq!(temp.unit, "°C");

        let battery = fields.iter().find(|f| f.name == "battery").unwrap();
        assert_eq!(battery.device_class, Some("voltage"));
        assert_eq!(battery.unit, "mV");
    }

    #[test]
    fn test_rssi_field_is_hostname_scoped() {
        let fields = declared_fields("pi-attic");
        let rssi = fields.iter().find(|f| f.name == "rssi_pi-attic").unwrap();
        assert_eq!(rssi.device_class, None);
        assert_eq!(rssi.unit, "dBm");
    }
}
