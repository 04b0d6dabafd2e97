//! Append-only conversation transcript shared between workers.
//!
//! The canonical long-lived helper several actors keep alive together
//! through [`Owns`](crate::owns::Owns): a chat worker appends what it hears,
//! a talker reads it back, and the transcript survives until the last of
//! them releases its claim.

use serde::{Deserialize, Serialize};

/// One speaker-tagged line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    /// Who said it.
    pub speaker: String,
    /// What was said.
    pub text: String,
}

/// Speaker-tagged lines in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatLog {
    lines: Vec<ChatLine>,
}

impl ChatLog {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line.
    pub fn say(&mut self, speaker: &str, text: &str) {
        self.lines.push(ChatLine {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing has been said yet.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The most recent line, if any.
    pub fn last(&self) -> Option<&ChatLine> {
        self.lines.last()
    }

    /// Render the whole transcript, one `speaker: text` line each.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{}: {}", line.speaker, line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = ChatLog::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());
        assert_eq!(log.render(), "");
    }

    #[test]
    fn test_say_and_render() {
        let mut log = ChatLog::new();
        log.say("alice", "hello");
        log.say("bob", "hi");
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().speaker, "bob");
        assert_eq!(log.render(), "alice: hello\nbob: hi");
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut log = ChatLog::new();
        log.say("alice", "hello");
        let json = serde_json::to_string(&log).unwrap();
        let back: ChatLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
