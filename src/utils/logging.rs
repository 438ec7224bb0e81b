//! Optional plain-text transcript logging.
//!
//! Transcripts live only for the session; when the user passes
//! `--log-file`, each completed turn is also appended to that file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub struct TranscriptLog {
    path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn new(path: Option<String>) -> Result<Self, std::io::Error> {
        let path = path.map(PathBuf::from);
        if let Some(path) = &path {
            // Verify write access up front so a bad path fails at startup,
            // not mid-conversation.
            OpenOptions::new().create(true).append(true).open(path)?;
        }
        Ok(Self { path })
    }

    pub fn is_active(&self) -> bool {
        self.path.is_some()
    }

    /// Append one turn as `speaker: content`, with a blank separator line.
    pub fn record(&self, speaker: &str, content: &str) -> Result<(), std::io::Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut lines = content.lines();
        if let Some(first) = lines.next() {
            writeln!(file, "{speaker}: {first}")?;
        }
        for line in lines {
            writeln!(file, "{line}")?;
        }
        writeln!(file)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_log_records_nothing() {
        let log = TranscriptLog::new(None).unwrap();
        assert!(!log.is_active());
        log.record("You", "hello").unwrap();
    }

    #[test]
    fn turns_are_appended_with_speaker_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.to_string_lossy().into_owned())).unwrap();
        assert!(log.is_active());

        log.record("You", "hello").unwrap();
        log.record("openai/gpt-4o", "hi\nthere").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "You: hello\n\nopenai/gpt-4o: hi\nthere\n\n");
    }
}
