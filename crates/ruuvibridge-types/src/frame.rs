//! Decoded RuuviTag broadcast data.

use serde::{Deserialize, Serialize};

/// A decoded RuuviTag RAWv2 (data format 5) broadcast.
///
/// Fields the tag marked as unavailable decode to `None` and are omitted from
/// the serialized form, so a reading with a dead humidity sensor still
/// produces valid output JSON without that key.
///
/// Serialized key names match the wire contract of the reading topic
/// (`temperature`, `acceleration_x`, `measurement_sequence_number`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuuviFrame {
    /// RuuviTag data format (always 5 for RAWv2).
    pub data_format: u8,
    /// Temperature in degrees Celsius, 0.005 °C resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative humidity percentage, 0.0025 % resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Atmospheric pressure in hPa.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// Combined acceleration magnitude in mG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<f64>,
    /// Acceleration along the X axis in mG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_x: Option<i16>,
    /// Acceleration along the Y axis in mG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_y: Option<i16>,
    /// Acceleration along the Z axis in mG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceleration_z: Option<i16>,
    /// Radio transmit power in dBm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_power: Option<i8>,
    /// Battery voltage in millivolts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<u16>,
    /// Movement counter, incremented by the tag's accelerometer interrupt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_counter: Option<u8>,
    /// Measurement sequence number, incremented once per measurement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_sequence_number: Option<u16>,
    /// MAC address embedded in the payload, colon-separated uppercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> RuuviFrame {
        RuuviFrame {
            data_format: 5,
            temperature: Some(24.3),
            humidity: Some(53.49),
            pressure: Some(1000.44),
            acceleration: Some(1036.02),
            acceleration_x: Some(4),
            acceleration_y: Some(-4),
            acceleration_z: Some(1036),
            tx_power: Some(4),
            battery: Some(2977),
            movement_counter: Some(66),
            measurement_sequence_number: Some(205),
            mac: Some("CB:B8:33:4C:88:4F".to_string()),
        }
    }

    #[test]
    fn test_frame_serializes_to_flat_object() {
        let json = serde_json::to_value(sample_frame()).unwrap();
        assert_eq!(json["data_format"], 5);
        assert_eq!(json["temperature"], 24.3);
        assert_eq!(json["acceleration_y"], -4);
        assert_eq!(json["mac"], "CB:B8:33:4C:88:4F");
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let frame = RuuviFrame {
            humidity: None,
            pressure: None,
            ..sample_frame()
        };
        let json = serde_json::to_value(frame).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("humidity"));
        assert!(!obj.contains_key("pressure"));
        assert!(obj.contains_key("temperature"));
    }
}
