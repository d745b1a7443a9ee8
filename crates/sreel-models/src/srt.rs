//! SRT subtitle records.
//!
//! Start/end times are cumulative sums of prior audio-segment durations;
//! the pipeline assigns them, this module only holds the wire format.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format seconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}

/// One subtitle record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SrtEntry {
    /// 1-based sequence number
    pub seq: usize,
    /// Start time in seconds from the beginning of the full audio track
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Subtitle text line
    pub text: String,
}

impl SrtEntry {
    pub fn new(seq: usize, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            seq,
            start,
            end,
            text: text.into(),
        }
    }

    /// Duration covered by this entry, in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.seq)?;
        writeln!(
            f,
            "{} --> {}",
            format_srt_timestamp(self.start),
            format_srt_timestamp(self.end)
        )?;
        writeln!(f, "{}", self.text)
    }
}

/// Render a full SRT file: records separated by blank lines.
pub fn render_srt(entries: &[SrtEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(2.0), "00:00:02,000");
        assert_eq!(format_srt_timestamp(3.5), "00:00:03,500");
        assert_eq!(format_srt_timestamp(3661.042), "01:01:01,042");
    }

    #[test]
    fn test_entry_display() {
        let entry = SrtEntry::new(1, 0.0, 2.0, "Hello world");
        let rendered = entry.to_string();
        assert_eq!(rendered, "1\n00:00:00,000 --> 00:00:02,000\nHello world\n");
    }

    #[test]
    fn test_render_separates_with_blank_line() {
        let entries = vec![
            SrtEntry::new(1, 0.0, 2.0, "Hello world"),
            SrtEntry::new(2, 2.0, 3.5, "Second line"),
        ];
        let srt = render_srt(&entries);
        assert!(srt.contains("Hello world\n\n2\n"));
        assert!(srt.ends_with("Second line\n\n"));
    }

    #[test]
    fn test_scenario_timestamps() {
        // Audio durations [2.0, 1.5, 3.0] stacked cumulatively.
        let entries = vec![
            SrtEntry::new(1, 0.0, 2.0, "Hello world"),
            SrtEntry::new(2, 2.0, 3.5, "Second line"),
            SrtEntry::new(3, 3.5, 6.5, "Final line"),
        ];
        assert_eq!(format_srt_timestamp(entries[2].start), "00:00:03,500");
        assert_eq!(format_srt_timestamp(entries[2].end), "00:00:06,500");
        for pair in entries.windows(2) {
            assert!(pair[1].start >= pair[0].start);
        }
    }
}
