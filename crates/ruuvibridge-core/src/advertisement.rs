//! RuuviTag advertisement payload decoding.
//!
//! RuuviTags broadcast their readings as BLE manufacturer data under
//! manufacturer ID 0x0499. This module decodes the RAWv2 payload (data
//! format 5): 24 bytes, big-endian, with reserved marker values for fields
//! the tag could not measure.
//!
//! Layout after the format byte:
//!
//! - bytes 0-1: temperature (i16, 0.005 °C)
//! - bytes 2-3: humidity (u16, 0.0025 %)
//! - bytes 4-5: pressure (u16, Pa, offset +50000)
//! - bytes 6-11: acceleration X/Y/Z (i16 each, mG)
//! - bytes 12-13: power info (11 bits battery, 5 bits TX power)
//! - byte 14: movement counter (u8)
//! - bytes 15-16: measurement sequence number (u16)
//! - bytes 17-22: MAC address (6 bytes)

use bytes::Buf;

use ruuvibridge_types::{ParseError, RuuviFrame};

/// Bluetooth SIG manufacturer ID assigned to Ruuvi Innovations.
pub const MANUFACTURER_ID: u16 = 0x0499;

/// Data format byte for RAWv2 payloads.
pub const DATA_FORMAT_RAW_V2: u8 = 5;

/// RAWv2 payload length including the format byte.
const RAW_V2_LEN: usize = 24;

/// Decode RuuviTag manufacturer data into a [`RuuviFrame`].
///
/// `data` is the manufacturer-data value as delivered by the BLE layer,
/// excluding the manufacturer ID itself. Only data format 5 (RAWv2) is
/// supported; format 3 tags predate the fields this gateway declares and are
/// rejected as unsupported.
///
/// Reserved marker values ("value not available") decode to `None` rather
/// than an error, so a tag with a failed humidity sensor still yields a
/// usable frame.
pub fn parse_manufacturer_data(data: &[u8]) -> Result<RuuviFrame, ParseError> {
    let format = *data.first().ok_or(ParseError::InsufficientBytes {
        expected: RAW_V2_LEN,
        actual: 0,
    })?;

    if format != DATA_FORMAT_RAW_V2 {
        return Err(ParseError::UnsupportedDataFormat(format));
    }

    if data.len() < RAW_V2_LEN {
        return Err(ParseError::InsufficientBytes {
            expected: RAW_V2_LEN,
            actual: data.len(),
        });
    }

    let mut buf = &data[1..];
    let temp_raw = buf.get_i16();
    let humidity_raw = buf.get_u16();
    let pressure_raw = buf.get_u16();
    let acc_x_raw = buf.get_i16();
    let acc_y_raw = buf.get_i16();
    let acc_z_raw = buf.get_i16();
    let power_raw = buf.get_u16();
    let movement_raw = buf.get_u8();
    let sequence_raw = buf.get_u16();
    let mut mac = [0u8; 6];
    buf.copy_to_slice(&mut mac);

    let temperature = (temp_raw != i16::MIN).then(|| round_to(f64::from(temp_raw) * 0.005, 3));
    let humidity = (humidity_raw != u16::MAX).then(|| round_to(f64::from(humidity_raw) * 0.0025, 4));
    let pressure =
        (pressure_raw != u16::MAX).then(|| round_to((f64::from(pressure_raw) + 50_000.0) / 100.0, 2));

    let acceleration_x = (acc_x_raw != i16::MIN).then_some(acc_x_raw);
    let acceleration_y = (acc_y_raw != i16::MIN).then_some(acc_y_raw);
    let acceleration_z = (acc_z_raw != i16::MIN).then_some(acc_z_raw);
    let acceleration = match (acceleration_x, acceleration_y, acceleration_z) {
        (Some(x), Some(y), Some(z)) => {
            let (x, y, z) = (f64::from(x), f64::from(y), f64::from(z));
            Some(round_to((x * x + y * y + z * z).sqrt(), 2))
        }
        _ => None,
    };

    // Power info packs battery voltage in the top 11 bits, TX power below.
    let battery_bits = power_raw >> 5;
    let tx_bits = power_raw & 0x1F;
    let battery = (battery_bits != 0x7FF).then(|| battery_bits + 1600);
    let tx_power = (tx_bits != 0x1F).then(|| (tx_bits as i8) * 2 - 40);

    let movement_counter = (movement_raw != u8::MAX).then_some(movement_raw);
    let measurement_sequence_number = (sequence_raw != u16::MAX).then_some(sequence_raw);

    let mac = (mac != [0xFF; 6]).then(|| format_mac(&mac));

    Ok(RuuviFrame {
        data_format: DATA_FORMAT_RAW_V2,
        temperature,
        humidity,
        pressure,
        acceleration,
        acceleration_x,
        acceleration_y,
        acceleration_z,
        tx_power,
        battery,
        movement_counter,
        measurement_sequence_number,
        mac,
    })
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference RAWv2 payload from the Ruuvi format documentation.
    const VALID: [u8; 24] = [
        0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C, 0xAC, 0x36,
        0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
    ];

    const ALL_INVALID: [u8; 24] = [
        0x05, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0xFF, 0xFF,
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    ];

    #[test]
    fn test_parse_reference_payload() {
        let frame = parse_manufacturer_data(&VALID).unwrap();
        assert_eq!(frame.data_format, 5);
        assert_eq!(frame.temperature, Some(24.3));
        assert_eq!(frame.humidity, Some(53.49));
        assert_eq!(frame.pressure, Some(1000.44));
        assert_eq!(frame.acceleration_x, Some(4));
        assert_eq!(frame.acceleration_y, Some(-4));
        assert_eq!(frame.acceleration_z, Some(1036));
        assert_eq!(frame.acceleration, Some(1036.02));
        assert_eq!(frame.battery, Some(2977));
        assert_eq!(frame.tx_power, Some(4));
        assert_eq!(frame.movement_counter, Some(66));
        assert_eq!(frame.measurement_sequence_number, Some(205));
        assert_eq!(frame.mac.as_deref(), Some("CB:B8:33:4C:88:4F"));
    }

    #[test]
    fn test_parse_all_invalid_markers() {
        let frame = parse_manufacturer_data(&ALL_INVALID).unwrap();
        assert_eq!(frame.data_format, 5);
        assert_eq!(frame.temperature, None);
        assert_eq!(frame.humidity, None);
        assert_eq!(frame.pressure, None);
        assert_eq!(frame.acceleration, None);
        assert_eq!(frame.acceleration_x, None);
        assert_eq!(frame.tx_power, None);
        assert_eq!(frame.battery, None);
        assert_eq!(frame.movement_counter, None);
        assert_eq!(frame.measurement_sequence_number, None);
        assert_eq!(frame.mac, None);
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        let err = parse_manufacturer_data(&VALID[..10]).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientBytes {
                expected: 24,
                actual: 10
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_payload() {
        let err = parse_manufacturer_data(&[]).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientBytes { actual: 0, .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let mut data = VALID;
        data[0] = 0x03;
        let err = parse_manufacturer_data(&data).unwrap_err();
        assert_eq!(err, ParseError::UnsupportedDataFormat(0x03));
    }

    #[test]
    fn test_mac_formatting() {
        assert_eq!(
            format_mac(&[0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F]),
            "CB:B8:33:4C:88:4F"
        );
        assert_eq!(format_mac(&[0, 1, 2, 3, 4, 5]), "00:01:02:03:04:05");
    }
}
