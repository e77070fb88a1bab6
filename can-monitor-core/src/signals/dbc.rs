//! DBC file parser
//!
//! Parses Vector DBC files and converts them into the internal signal
//! database format. Parsing itself is delegated to the `can-dbc` crate;
//! this module only maps its output onto our definitions and derives the
//! matching mode for each message id.

use crate::signals::database::{
    ByteOrder, MatchMode, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType,
};
use crate::types::{MonitorError, Result};
use std::path::Path;

/// Parse a DBC file and return message definitions in file order
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path)
        .map_err(|e| MonitorError::DbcParseError(format!("Failed to read file {:?}: {}", path, e)))?;

    // Try UTF-8 first, then fall back to Latin-1/Windows-1252
    let dbc_content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    // Parse using can-dbc crate
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        MonitorError::DbcParseError(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc")
        .to_string();

    // Convert to our internal format, preserving file order
    let mut messages = Vec::new();

    for dbc_msg in dbc.messages() {
        let message = convert_message(dbc_msg, &source_filename)?;
        messages.push(message);
    }

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Extract the plain CAN id from a can-dbc message id
///
/// DBC files mark extended ids by setting the high bit of the raw value.
/// Masking to 29 bits strips that flag and leaves standard ids untouched.
fn raw_message_id(id: &can_dbc::MessageId) -> u32 {
    id.0 & 0x1FFF_FFFF
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> Result<MessageDefinition> {
    let mut signals = Vec::new();
    let mut is_multiplexed = false;
    let mut multiplexer_signal_name: Option<String> = None;

    // First pass: identify multiplexer signal
    for dbc_sig in dbc_msg.signals() {
        if let can_dbc::MultiplexIndicator::Multiplexor = dbc_sig.multiplexer_indicator() {
            is_multiplexed = true;
            multiplexer_signal_name = Some(dbc_sig.name().to_string());
            break;
        } else if matches!(
            dbc_sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
        ) {
            is_multiplexed = true;
        }
    }

    // Second pass: convert all signals
    for dbc_sig in dbc_msg.signals() {
        let signal = convert_signal(dbc_sig, multiplexer_signal_name.as_deref())?;
        signals.push(signal);
    }

    let id = raw_message_id(dbc_msg.message_id());

    Ok(MessageDefinition {
        id,
        match_mode: MatchMode::for_id(id),
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        is_multiplexed,
        multiplexer_signal: multiplexer_signal_name,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal_name: Option<&str>,
) -> Result<SignalDefinition> {
    // Determine byte order
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    // Determine value type
    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    // Handle multiplexer information
    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value) => Some(MultiplexerInfo {
            multiplexer_signal: multiplexer_signal_name
                .ok_or_else(|| {
                    MonitorError::DbcParseError(format!(
                        "Multiplexed signal '{}' has no multiplexor in its message",
                        dbc_sig.name()
                    ))
                })?
                .to_string(),
            multiplexer_values: vec![switch_value],
        }),
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        multiplexer_info,
    })
}
