//! Unified signal database
//!
//! Combines message definitions from multiple DBC files into a single
//! ordered store. Frame matching scans definitions in load order (files
//! in the order they were loaded, messages in their stored order) and
//! returns the first hit, so matching stays reproducible across runs.

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u32,
    /// How incoming frame ids are compared against `id`
    pub match_mode: MatchMode,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// True if this message has multiplexed signals
    pub is_multiplexed: bool,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// Check whether an incoming frame id matches this definition
    pub fn matches(&self, can_id: u32) -> bool {
        match self.match_mode {
            MatchMode::Exact => self.id == can_id,
            MatchMode::Masked => self.id & 0xFFFF_FF00 == can_id & 0xFFFF_FF00,
        }
    }
}

/// Frame id comparison mode
///
/// Masked mode implements the addressing-extension convention where a
/// definition id whose low byte is `0xFE` stands for a whole id group:
/// the low byte of the incoming id is ignored and only the upper 24 bits
/// are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Bit-for-bit id equality
    Exact,
    /// Compare the upper 24 bits, ignore the low byte
    Masked,
}

impl MatchMode {
    /// Determine the mode for a defining id: low byte `0xFE` selects
    /// masked matching, anything else is exact
    pub fn for_id(id: u32) -> Self {
        if id & 0xFF == 0xFE {
            MatchMode::Masked
        } else {
            MatchMode::Exact
        }
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    /// Byte order for extraction
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value from the database
    pub min: f64,
    /// Maximum physical value from the database
    pub max: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Name of the multiplexer signal that controls this signal
    pub multiplexer_signal: String,
    /// Multiplexer value(s) for which this signal is active
    pub multiplexer_values: Vec<u64>,
}

/// The unified signal database
///
/// Message definitions are kept in a plain `Vec` in insertion order; the
/// matcher depends on that order for its first-match-wins policy, so no
/// hash-based lookup is used.
pub struct SignalDatabase {
    messages: Vec<MessageDefinition>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Append a message definition, preserving load order
    pub fn add_message(&mut self, message: MessageDefinition) {
        self.messages.push(message);
    }

    /// Find the definition for an incoming frame id
    ///
    /// Scans all definitions in load order and returns the first whose
    /// exact or masked comparison succeeds; `None` means the frame is
    /// unknown to every loaded database.
    pub fn match_frame(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.iter().find(|msg| msg.matches(can_id))
    }

    /// All message definitions in load order
    pub fn messages(&self) -> &[MessageDefinition] {
        &self.messages
    }

    /// True when no definitions are loaded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every signal whose name does not satisfy `keep`, then drop
    /// messages left with no signals
    ///
    /// Used to pre-filter freshly loaded databases down to the watched
    /// signal names so unrelated messages never reach the decoder.
    pub fn retain_signals<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        for message in &mut self.messages {
            message.signals.retain(|sig| keep(&sig.name));
        }
        self.messages.retain(|msg| !msg.signals.is_empty());
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages = self.messages.len();
        let num_signals = self.messages.iter().map(|msg| msg.signals.len()).sum();

        DatabaseStats {
            num_messages,
            num_signals,
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}

impl Default for SignalDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(name: &str) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit: 0,
            length: 16,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 8000.0,
            unit: Some("rpm".to_string()),
            multiplexer_info: None,
        }
    }

    fn test_message(id: u32, name: &str, signals: Vec<SignalDefinition>) -> MessageDefinition {
        MessageDefinition {
            id,
            match_mode: MatchMode::for_id(id),
            name: name.to_string(),
            size: 8,
            sender: Some("ECU1".to_string()),
            signals,
            is_multiplexed: false,
            multiplexer_signal: None,
            source: "test.dbc".to_string(),
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
        assert!(db.match_frame(0x123).is_none());
    }

    #[test]
    fn test_exact_match() {
        let mut db = SignalDatabase::new();
        db.add_message(test_message(0x123, "EngineData", vec![test_signal("EngineSpeed")]));

        let msg = db.match_frame(0x123).unwrap();
        assert_eq!(msg.name, "EngineData");
        assert_eq!(msg.match_mode, MatchMode::Exact);
        assert!(db.match_frame(0x124).is_none());
    }

    #[test]
    fn test_masked_match_ignores_low_byte() {
        let mut db = SignalDatabase::new();
        db.add_message(test_message(0x1000_00FE, "GroupStatus", vec![test_signal("NodeState")]));

        let def = db.match_frame(0x1000_0099).unwrap();
        assert_eq!(def.name, "GroupStatus");
        assert_eq!(def.match_mode, MatchMode::Masked);

        // Upper 24 bits differ, so no match even though the shape fits
        assert!(db.match_frame(0x2000_0099).is_none());
    }

    #[test]
    fn test_low_byte_fe_selects_masked_mode() {
        assert_eq!(MatchMode::for_id(0x1000_00FE), MatchMode::Masked);
        assert_eq!(MatchMode::for_id(0x18FE_02FE), MatchMode::Masked);
        assert_eq!(MatchMode::for_id(0x1000_00FD), MatchMode::Exact);
        assert_eq!(MatchMode::for_id(0x123), MatchMode::Exact);
    }

    #[test]
    fn test_first_match_wins_in_load_order() {
        let mut db = SignalDatabase::new();
        db.add_message(test_message(0x200, "FirstLoaded", vec![test_signal("A")]));
        db.add_message(test_message(0x200, "SecondLoaded", vec![test_signal("B")]));

        assert_eq!(db.match_frame(0x200).unwrap().name, "FirstLoaded");
    }

    #[test]
    fn test_masked_definition_shadows_later_exact() {
        let mut db = SignalDatabase::new();
        db.add_message(test_message(0x1000_00FE, "Group", vec![test_signal("A")]));
        db.add_message(test_message(0x1000_0011, "Specific", vec![test_signal("B")]));

        // The masked definition was loaded first, so it claims the id
        assert_eq!(db.match_frame(0x1000_0011).unwrap().name, "Group");
    }

    #[test]
    fn test_retain_signals_drops_empty_messages() {
        let mut db = SignalDatabase::new();
        db.add_message(test_message(
            0x100,
            "Kept",
            vec![test_signal("Watched"), test_signal("Ignored")],
        ));
        db.add_message(test_message(0x200, "Dropped", vec![test_signal("Other")]));

        db.retain_signals(|name| name == "Watched");

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);
        assert_eq!(db.messages()[0].name, "Kept");
        assert!(db.match_frame(0x200).is_none());
    }
}
