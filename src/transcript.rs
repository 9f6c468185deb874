//! The displayed conversation: an append-only list of `(speaker, text)` pairs.

use std::fmt;

use serde::Serialize;

/// Who a transcript entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Speaker {
    You,
    Bot,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::You => f.write_str("You"),
            Speaker::Bot => f.write_str("Bot"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub speaker: Speaker,
    pub text: String,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Entries are only ever appended; order is insertion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_question(&mut self, text: impl Into<String>) {
        self.push(Speaker::You, text);
    }

    /// One streamed chunk of a reply.
    pub fn push_chunk(&mut self, text: impl Into<String>) {
        self.push(Speaker::Bot, text);
    }

    fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.entries.push(Entry {
            speaker,
            text: text.into(),
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `"You: ..."` / `"Bot: ..."` lines, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}
