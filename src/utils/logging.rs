use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::core::message::Message;

/// Opt-in plain-text transcript of a run, appended message by message.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Opens (or creates) the log and writes a timestamped header for this run.
    pub fn open(path: impl Into<PathBuf>, header: &str) -> io::Result<Self> {
        let log = Self {
            file_path: Some(path.into()),
        };
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S %z");
        log.write_block(&format!("## {header} ({stamp})"))?;
        Ok(log)
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn log_prompt(&self, label: &str, text: &str) -> io::Result<()> {
        self.write_block(&format!("{label}: {text}"))
    }

    /// Writes an assistant reply as-is. Empty replies and other roles are skipped.
    pub fn log_reply(&self, reply: &Message) -> io::Result<()> {
        if reply.is_assistant() && !reply.content.is_empty() {
            self.write_block(&reply.content)
        } else {
            Ok(())
        }
    }

    pub fn log_note(&self, note: &str) -> io::Result<()> {
        self.write_block(&format!("## {note}"))
    }

    fn write_block(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // blank line between messages
        writeln!(writer)?;
        writer.flush()
    }
}
