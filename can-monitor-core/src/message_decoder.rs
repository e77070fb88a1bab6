//! Message decoding engine
//!
//! Extracts signal values from raw CAN payloads based on the matched
//! message definition. Handles bit extraction, endianness, multiplexing,
//! and physical value conversion. Decoding is stateless: the same payload
//! and definition always produce the same result.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecodedMessage, DecodedSignal, SignalValue};

/// Message decoder - extracts signals from CAN payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode a payload against a message definition
    ///
    /// # Arguments
    /// * `data` - Raw frame payload
    /// * `message_def` - Message definition from the signal database
    ///
    /// # Returns
    /// * `Some(DecodedMessage)` if at least one signal decoded
    /// * `None` if no signals could be decoded
    pub fn decode_message(data: &[u8], message_def: &MessageDefinition) -> Option<DecodedMessage> {
        let mut decoded_signals = Vec::new();
        let mut multiplexer_value: Option<u64> = None;

        // For multiplexed messages, first extract the multiplexer value
        if message_def.is_multiplexed {
            if let Some(ref mux_signal_name) = message_def.multiplexer_signal {
                if let Some(mux_signal) = message_def
                    .signals
                    .iter()
                    .find(|s| s.name == *mux_signal_name)
                {
                    if let Some(value) = Self::extract_signal_value(data, mux_signal) {
                        multiplexer_value = Some(value as u64);
                    }
                }
            }
        }

        for signal in &message_def.signals {
            // Multiplexed signals only decode when the switch matches
            if let Some(ref mux_info) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(current) if mux_info.multiplexer_values.contains(&current) => {}
                    _ => continue,
                }
            }

            if let Some(decoded) = Self::decode_signal(data, signal) {
                decoded_signals.push(decoded);
            }
        }

        if decoded_signals.is_empty() {
            return None;
        }

        Some(DecodedMessage {
            message_name: message_def.name.clone(),
            signals: decoded_signals,
        })
    }

    /// Decode a single signal from payload data
    fn decode_signal(data: &[u8], signal: &SignalDefinition) -> Option<DecodedSignal> {
        let raw_value = Self::extract_signal_value(data, signal)?;

        // Apply physical value conversion (factor and offset)
        let physical_value = signal.offset + signal.factor * (raw_value as f64);

        let value = if signal.factor == 1.0 && signal.offset == 0.0 && signal.length == 1 {
            // Single bit without scaling
            SignalValue::Boolean(raw_value != 0)
        } else if signal.factor != 1.0 || signal.offset != 0.0 {
            // Scaled signal
            SignalValue::Float(physical_value)
        } else {
            // Plain integer
            SignalValue::Integer(raw_value)
        };

        Some(DecodedSignal {
            name: signal.name.clone(),
            value,
            unit: signal.unit.clone(),
            raw_value,
        })
    }

    /// Extract the raw signal value from payload data
    ///
    /// Returns `None` when the payload is too short for the signal's bit
    /// range; other signals in the same frame are unaffected.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        let required_bytes = match signal.byte_order {
            ByteOrder::LittleEndian => (start_bit + length + 7) / 8,
            ByteOrder::BigEndian => {
                // Motorola start bits address the MSB within the byte;
                // convert to a linear bit index before measuring the span
                let linear_start = (start_bit / 8) * 8 + (7 - start_bit % 8);
                (linear_start + length + 7) / 8
            }
        };
        if required_bytes > data.len() {
            log::warn!(
                "Signal '{}' requires {} bytes but frame only has {} bytes",
                signal.name,
                required_bytes,
                data.len()
            );
            return None;
        }

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        };

        let signed_value = match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        };

        Some(signed_value)
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// The start bit points to the LSB; bits are collected upward from
    /// there, crossing byte boundaries toward higher byte indices.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;

        for i in 0..length {
            let bit_pos = start_bit + i;
            let byte_idx = bit_pos / 8;
            let bit_in_byte = bit_pos % 8;

            if byte_idx < data.len() {
                let bit_value = (data[byte_idx] >> bit_in_byte) & 0x01;
                result |= (bit_value as u64) << i;
            }
        }

        result
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// The start bit points to the MSB of the signal, numbered 7..0 within
    /// its byte. The walk reads toward bit 0, then continues at bit 7 of
    /// the following byte, accumulating MSB-first.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;
        let mut byte_idx = start_bit / 8;
        let mut bit_in_byte = start_bit % 8;

        for _ in 0..length {
            result <<= 1;
            if byte_idx < data.len() {
                result |= ((data[byte_idx] >> bit_in_byte) & 0x01) as u64;
            }

            if bit_in_byte == 0 {
                byte_idx += 1;
                bit_in_byte = 7;
            } else {
                bit_in_byte -= 1;
            }
        }

        result
    }

    /// Sign-extend a value from N bits to 64 bits
    ///
    /// If the value's MSB is 1, fill the upper bits with 1s.
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::{MatchMode, MultiplexerInfo};

    fn signal(
        name: &str,
        start_bit: u16,
        length: u16,
        byte_order: ByteOrder,
        value_type: ValueType,
        factor: f64,
        offset: f64,
    ) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order,
            value_type,
            factor,
            offset,
            min: 0.0,
            max: 0.0,
            unit: None,
            multiplexer_info: None,
        }
    }

    fn message(name: &str, signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id: 0x123,
            match_mode: MatchMode::Exact,
            name: name.to_string(),
            size: 8,
            sender: None,
            signals,
            is_multiplexed: false,
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_extract_little_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = MessageDecoder::extract_little_endian(&data, 0, 8);
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = MessageDecoder::extract_little_endian(&data, 0, 16);
        assert_eq!(value, 0xCDAB);
    }

    #[test]
    fn test_extract_little_endian_offset_bits() {
        // Bits 4..11 of [0xAB, 0xCD]: low nibble 0xA, then 0xD from the
        // next byte above it
        let data = vec![0xAB, 0xCD];
        let value = MessageDecoder::extract_little_endian(&data, 4, 8);
        assert_eq!(value, 0xDA);
    }

    #[test]
    fn test_extract_big_endian_simple() {
        let data = vec![0xAB, 0xCD, 0xEF, 0x12];
        let value = MessageDecoder::extract_big_endian(&data, 7, 8);
        assert_eq!(value, 0xAB);
    }

    #[test]
    fn test_extract_big_endian_cross_byte() {
        let data = vec![0xAB, 0xCD];
        let value = MessageDecoder::extract_big_endian(&data, 7, 16);
        assert_eq!(value, 0xABCD);
    }

    #[test]
    fn test_extract_big_endian_mid_byte_start() {
        // Start at bit 3 of byte 0: bits 3..0 of 0xAB (0b1011), then bits
        // 7..4 of 0xCD (0b1100)
        let data = vec![0xAB, 0xCD];
        let value = MessageDecoder::extract_big_endian(&data, 3, 8);
        assert_eq!(value, 0xBC);
    }

    #[test]
    fn test_sign_extend_positive() {
        let value = MessageDecoder::sign_extend(0x7F, 8);
        assert_eq!(value, 127);
    }

    #[test]
    fn test_sign_extend_negative() {
        let value = MessageDecoder::sign_extend(0xFF, 8);
        assert_eq!(value, -1);
    }

    #[test]
    fn test_sign_extend_negative_16bit() {
        let value = MessageDecoder::sign_extend(0x8000, 16);
        assert_eq!(value, -32768);
    }

    #[test]
    fn test_decode_scaled_signal() {
        // 16-bit little-endian engine speed, 0.125 rpm/bit
        let def = message(
            "EngineData",
            vec![signal(
                "EngineSpeed",
                0,
                16,
                ByteOrder::LittleEndian,
                ValueType::Unsigned,
                0.125,
                0.0,
            )],
        );

        let decoded = MessageDecoder::decode_message(&[0x00, 0x1A], &def).unwrap();
        assert_eq!(decoded.message_name, "EngineData");
        assert_eq!(decoded.signals.len(), 1);
        assert_eq!(decoded.signals[0].raw_value, 0x1A00);
        assert_eq!(decoded.signals[0].value, SignalValue::Float(832.0));
    }

    #[test]
    fn test_decode_value_classification() {
        let def = message(
            "Mixed",
            vec![
                signal("Flag", 0, 1, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0),
                signal("Count", 8, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0),
                signal("Temp", 16, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, -40.0),
            ],
        );

        let decoded = MessageDecoder::decode_message(&[0x01, 0x2A, 0x50], &def).unwrap();
        assert_eq!(decoded.signals[0].value, SignalValue::Boolean(true));
        assert_eq!(decoded.signals[1].value, SignalValue::Integer(42));
        assert_eq!(decoded.signals[2].value, SignalValue::Float(40.0));
    }

    #[test]
    fn test_decode_signed_signal() {
        let def = message(
            "Trim",
            vec![signal(
                "SteeringAngle",
                0,
                16,
                ByteOrder::LittleEndian,
                ValueType::Signed,
                0.1,
                0.0,
            )],
        );

        // -100 raw -> -10.0 degrees
        let decoded = MessageDecoder::decode_message(&[0x9C, 0xFF], &def).unwrap();
        assert_eq!(decoded.signals[0].raw_value, -100);
        assert_eq!(decoded.signals[0].value, SignalValue::Float(-10.0));
    }

    #[test]
    fn test_short_payload_drops_only_affected_signal() {
        let def = message(
            "Partial",
            vec![
                signal("Low", 0, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0),
                signal("High", 32, 16, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0),
            ],
        );

        // Two-byte payload: "High" needs six bytes and is absent
        let decoded = MessageDecoder::decode_message(&[0x11, 0x22], &def).unwrap();
        assert_eq!(decoded.signals.len(), 1);
        assert_eq!(decoded.signals[0].name, "Low");
    }

    #[test]
    fn test_empty_payload_decodes_nothing() {
        let def = message(
            "Empty",
            vec![signal("Any", 0, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0)],
        );

        assert!(MessageDecoder::decode_message(&[], &def).is_none());
    }

    #[test]
    fn test_multiplexed_signals_follow_switch() {
        let mut mode = signal("Mode", 0, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0);
        mode.multiplexer_info = None;
        let mut sig_a = signal("SignalA", 8, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0);
        sig_a.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![0],
        });
        let mut sig_b = signal("SignalB", 8, 8, ByteOrder::LittleEndian, ValueType::Unsigned, 1.0, 0.0);
        sig_b.multiplexer_info = Some(MultiplexerInfo {
            multiplexer_signal: "Mode".to_string(),
            multiplexer_values: vec![1],
        });

        let mut def = message("Muxed", vec![mode, sig_a, sig_b]);
        def.is_multiplexed = true;
        def.multiplexer_signal = Some("Mode".to_string());

        let decoded = MessageDecoder::decode_message(&[0x00, 0x55], &def).unwrap();
        let names: Vec<&str> = decoded.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mode", "SignalA"]);

        let decoded = MessageDecoder::decode_message(&[0x01, 0x55], &def).unwrap();
        let names: Vec<&str> = decoded.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Mode", "SignalB"]);
    }
}
