//! Run transcript
//!
//! Ordered record of (agent, output) pairs accumulated during one run and
//! rendered as the final result string. Created fresh per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One transcript entry: an agent identity and the text it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Name the output was recorded under
    pub agent: String,
    /// Text the agent produced
    pub content: String,
    /// When the entry was appended
    pub at: DateTime<Utc>,
}

/// Append-only accumulation of per-agent outputs for a single run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; no validation is performed
    pub fn append(&mut self, agent: impl Into<String>, content: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            agent: agent.into(),
            content: content.into(),
            at: Utc::now(),
        });
    }

    /// Entries in append order
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the transcript as newline-joined `name: content` lines.
    /// Deterministic for a given append sequence.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.agent, entry.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Serialize the entries as JSON
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
