//! Accumulated display text of a session
//!
//! The transcript is what an operator sees scroll by: decoded chunks,
//! disconnect notices and host messages. It can be cleared and saved.

use super::sink::{SessionEvent, Sink};
use chrono::Local;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const SAVE_MARKER: &str = " - - - - - -  - - - - - - \n";

/// Display transcript
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    text: String,
    chunks: usize,
    max_len: Option<usize>,
}

impl Transcript {
    /// Create an empty, unbounded transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_len` bytes, dropping the oldest whole lines
    #[must_use]
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Current text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of received chunks recorded
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    /// Append a host message line
    pub fn note(&mut self, message: &str) {
        self.text.push_str(message);
        if !message.ends_with('\n') {
            self.text.push('\n');
        }
        self.trim();
    }

    /// Record one session event
    pub fn record(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Data(text) => {
                self.text.push_str(text);
                self.chunks += 1;
                self.trim();
            }
            SessionEvent::Disconnected { port } => {
                self.note(&format!(
                    "Port {port} disconnected or has issue, close it, please retry"
                ));
            }
        }
    }

    /// Drop all text
    pub fn clear(&mut self) {
        self.text.clear();
        self.chunks = 0;
    }

    /// Write the transcript to `path` as UTF-8, then note the save
    pub fn save(&mut self, path: &Path) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(self.text.as_bytes())?;
        writer.flush()?;

        tracing::info!("Transcript saved to {}", path.display());
        self.text.push_str(SAVE_MARKER);
        self.text.push_str(&format!("File saved at {}\n", path.display()));
        self.text.push_str(SAVE_MARKER);
        Ok(())
    }

    fn trim(&mut self) {
        let Some(max_len) = self.max_len else {
            return;
        };
        if self.text.len() <= max_len {
            return;
        }
        let mut excess = self.text.len() - max_len;
        while !self.text.is_char_boundary(excess) {
            excess += 1;
        }
        // cut after the first line break past the excess to keep whole lines
        let cut = match self.text[excess..].find('\n') {
            Some(offset) => excess + offset + 1,
            None => self.text.len(),
        };
        self.text.drain(..cut);
    }
}

impl Sink for Transcript {
    fn emit(&mut self, event: SessionEvent) {
        self.record(&event);
    }
}

/// Default transcript filename with a timestamp
pub fn default_transcript_filename(prefix: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{prefix}_{timestamp}.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_data_and_disconnect() {
        let mut transcript = Transcript::new();
        transcript.record(&SessionEvent::Data("OK\n".into()));
        transcript.emit(SessionEvent::Disconnected { port: "COM3".into() });

        assert_eq!(
            transcript.text(),
            "OK\nPort COM3 disconnected or has issue, close it, please retry\n"
        );
        assert_eq!(transcript.chunks(), 1);
    }

    #[test]
    fn test_save_writes_text_then_marks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");

        let mut transcript = Transcript::new();
        transcript.record(&SessionEvent::Data("48 69\n".into()));
        transcript.save(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "48 69\n");
        assert!(transcript.text().starts_with("48 69\n - - - - - -  - - - - - - \n"));
        assert!(transcript
            .text()
            .contains(&format!("File saved at {}\n", path.display())));
    }

    #[test]
    fn test_save_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcript = Transcript::new();
        assert!(transcript.save(&dir.path().join("nope/session.txt")).is_err());
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::new();
        transcript.note("hello");
        transcript.clear();
        assert!(transcript.text().is_empty());
        assert_eq!(transcript.chunks(), 0);
    }

    #[test]
    fn test_max_len_drops_oldest_lines() {
        let mut transcript = Transcript::new().max_len(8);
        transcript.note("line1");
        transcript.note("line2");
        assert_eq!(transcript.text(), "line2\n");
    }

    #[test]
    fn test_default_filename() {
        let name = default_transcript_filename("serdebug");
        assert!(name.starts_with("serdebug_"));
        assert!(name.ends_with(".txt"));
    }
}
