//! ASC trace logging
//!
//! Append-only writer producing a Vector ASC compatible trace of every
//! valid frame the pipeline sees, plus the line-level parser used to read
//! such traces back for replay. One file per run; the preamble is written
//! at creation and the `End TriggerBlock` footer exactly once on close,
//! whichever path gets there first.

use crate::types::{CanFrame, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Trace file writer
///
/// The underlying file handle lives in a mutex-guarded `Option`; `close`
/// takes it out, so a second close (or a late frame write) finds nothing
/// to do instead of touching a finalized file.
pub struct TraceWriter {
    writer: Mutex<Option<BufWriter<File>>>,
    path: PathBuf,
}

impl TraceWriter {
    /// Create the trace file and write the measurement preamble
    ///
    /// Fails if the file cannot be created; the caller treats that as a
    /// startup error.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Both stamped preamble lines carry the same wall-clock string
        let stamp = chrono::Local::now()
            .format("%a %b %d %I:%M:%S%.3f %P %Y")
            .to_string();
        writeln!(writer, "date {}", stamp)?;
        writeln!(writer, "base hex  timestamps absolute")?;
        writeln!(writer, "internal events logged")?;
        writeln!(writer, "// version 9.0.0")?;
        writeln!(writer, "Begin Triggerblock {}", stamp)?;
        writeln!(writer, "   0.000000 Start of measurement")?;
        writer.flush()?;

        log::info!("Trace file created: {}", path.display());

        Ok(Self {
            writer: Mutex::new(Some(writer)),
            path: path.to_path_buf(),
        })
    }

    /// Path of the trace file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one frame record
    ///
    /// Error frames are never written. Writes after `close` are silently
    /// skipped.
    pub fn log_frame(&self, frame: &CanFrame) -> Result<()> {
        if frame.is_error_frame {
            return Ok(());
        }

        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            writeln!(writer, "   {}", format_frame_line(frame))?;
        }
        Ok(())
    }

    /// Write the footer and finalize the file
    ///
    /// Idempotent; only the first call writes `End TriggerBlock`.
    pub fn close(&self) -> Result<()> {
        let taken = self.writer.lock().take();
        if let Some(mut writer) = taken {
            writeln!(writer, "End TriggerBlock")?;
            writer.flush()?;
            log::info!("Trace file closed: {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for TraceWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to finalize trace file {}: {}", self.path.display(), e);
        }
    }
}

/// Format one frame as an ASC record (without the leading indent)
///
/// Layout: elapsed seconds (6 decimals), 1-based channel, 8-digit upper
/// hex id with an `x` suffix, direction, `d`, dlc, then the payload bytes
/// as two-digit upper hex joined by single spaces. One more space closes
/// the record, so an empty payload leaves two spaces after the dlc.
pub fn format_frame_line(frame: &CanFrame) -> String {
    let bytes = frame
        .data
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{:.6} {}  {:08X}x       Rx   d {} {} ",
        frame.timestamp,
        u32::from(frame.channel) + 1,
        frame.can_id,
        frame.dlc(),
        bytes
    )
}

/// Parse one trace line back into a frame
///
/// Returns `None` for anything that is not a frame record (preamble,
/// trigger block markers, malformed lines), so a reader can feed every
/// line of a trace file through this and keep only the frames.
pub fn parse_frame_line(line: &str) -> Option<CanFrame> {
    let mut tokens = line.split_whitespace();

    let timestamp: f64 = tokens.next()?.parse().ok()?;
    let channel = tokens.next()?.parse::<u8>().ok()?.checked_sub(1)?;

    let id_token = tokens.next()?;
    let id_hex = id_token.strip_suffix('x').unwrap_or(id_token);
    let can_id = u32::from_str_radix(id_hex, 16).ok()?;

    let direction = tokens.next()?;
    if direction != "Rx" && direction != "Tx" {
        return None;
    }
    if tokens.next()? != "d" {
        return None;
    }

    let dlc: usize = tokens.next()?.parse().ok()?;
    let mut data = Vec::with_capacity(dlc);
    for _ in 0..dlc {
        data.push(u8::from_str_radix(tokens.next()?, 16).ok()?);
    }

    Some(CanFrame {
        can_id,
        channel,
        timestamp,
        data,
        is_error_frame: false,
    })
}

/// Build a timestamped log file path inside `dir`
///
/// Follows the `can_log_<day>_<month>_<year>_<hour>h-<min>min-<sec>sec.asc`
/// naming convention.
pub fn timestamped_log_path(dir: &Path) -> PathBuf {
    let name = chrono::Local::now()
        .format("can_log_%d_%b_%Y_%Ih-%Mmin-%Ssec.asc")
        .to_string();
    dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn frame(can_id: u32, channel: u8, timestamp: f64, data: Vec<u8>) -> CanFrame {
        CanFrame {
            can_id,
            channel,
            timestamp,
            data,
            is_error_frame: false,
        }
    }

    #[test]
    fn test_frame_record_format() {
        let f = frame(0x1FE02345, 0, 1.234567, vec![0x01, 0x02]);
        assert_eq!(
            format_frame_line(&f),
            "1.234567 1  1FE02345x       Rx   d 2 01 02 "
        );
    }

    #[test]
    fn test_frame_record_format_empty_payload() {
        // No payload bytes to join, so the dlc is followed by two spaces
        let f = frame(0x123, 1, 0.0, vec![]);
        assert_eq!(
            format_frame_line(&f),
            "0.000000 2  00000123x       Rx   d 0  "
        );
    }

    #[test]
    fn test_preamble_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.asc");
        let writer = TraceWriter::create(&path).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert!(lines[0].starts_with("date "));
        assert_eq!(lines[1], "base hex  timestamps absolute");
        assert_eq!(lines[2], "internal events logged");
        assert_eq!(lines[3], "// version 9.0.0");
        // The trigger block reuses the preamble timestamp verbatim
        assert_eq!(lines[4], format!("Begin Triggerblock {}", &lines[0][5..]));
        assert_eq!(lines[5], "   0.000000 Start of measurement");
        assert_eq!(lines[6], "End TriggerBlock");
    }

    #[test]
    fn test_footer_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.asc");

        {
            let writer = TraceWriter::create(&path).unwrap();
            writer.log_frame(&frame(0x100, 0, 0.01, vec![0xAA])).unwrap();
            writer.close().unwrap();
            writer.close().unwrap();
            // Drop runs close a third time
        }

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("End TriggerBlock").count(), 1);
        assert!(content.ends_with("End TriggerBlock\n"));
    }

    #[test]
    fn test_write_after_close_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.asc");

        let writer = TraceWriter::create(&path).unwrap();
        writer.close().unwrap();
        writer.log_frame(&frame(0x100, 0, 0.5, vec![0x01])).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("Rx"));
    }

    #[test]
    fn test_error_frames_are_not_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.asc");

        let writer = TraceWriter::create(&path).unwrap();
        let mut error_frame = frame(0x100, 0, 0.1, vec![]);
        error_frame.is_error_frame = true;
        writer.log_frame(&error_frame).unwrap();
        writer.log_frame(&frame(0x200, 0, 0.2, vec![0x11])).unwrap();
        writer.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Rx").count(), 1);
        assert!(content.contains("00000200x"));
    }

    #[test]
    fn test_frame_line_round_trip() {
        let original = frame(0x1FE02345, 2, 12.345678, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let parsed = parse_frame_line(&format_frame_line(&original)).unwrap();

        assert_eq!(parsed.can_id, original.can_id);
        assert_eq!(parsed.channel, original.channel);
        assert_eq!(parsed.timestamp, original.timestamp);
        assert_eq!(parsed.data, original.data);
        assert!(!parsed.is_error_frame);
    }

    #[test]
    fn test_parse_accepts_indented_record() {
        let parsed = parse_frame_line("   1.234567 1  1FE02345x       Rx   d 2 01 02 ").unwrap();
        assert_eq!(parsed.can_id, 0x1FE02345);
        assert_eq!(parsed.channel, 0);
        assert_eq!(parsed.data, vec![0x01, 0x02]);
    }

    #[test]
    fn test_parse_skips_non_frame_lines() {
        assert!(parse_frame_line("date Sat Mar 01 11:22:33.444 am 2025").is_none());
        assert!(parse_frame_line("base hex  timestamps absolute").is_none());
        assert!(parse_frame_line("   0.000000 Start of measurement").is_none());
        assert!(parse_frame_line("End TriggerBlock").is_none());
        assert!(parse_frame_line("").is_none());
    }

    #[test]
    fn test_log_path_follows_naming_convention() {
        let path = timestamped_log_path(Path::new("logs"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("can_log_"));
        assert!(name.ends_with("sec.asc"));
        assert!(!name.contains(':'));
        assert!(!name.contains(' '));
    }
}
