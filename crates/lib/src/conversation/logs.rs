//! Display logs: the chat transcript and the reasoning log.

/// Placeholder shown in the reasoning log while a question is in flight.
pub const THINKING: &str = "Thinking...";

pub const USER_PREFIX: &str = "🧑 You: ";
pub const AGENT_PREFIX: &str = "🤖 Agent: ";

/// Speaker-prefixed chat lines. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    entries: Vec<String>,
}

impl ChatTranscript {
    pub fn push_user(&mut self, text: &str) {
        self.entries.push(format!("{}{}", USER_PREFIX, text));
    }

    pub fn push_agent(&mut self, text: &str) {
        self.entries.push(format!("{}{}", AGENT_PREFIX, text));
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Position in a [`ReasoningLog`]. Stays valid when placeholders before it are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogMark(u64);

/// Progress and trace lines for the reasoning panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasoningLog {
    entries: Vec<String>,
    // Parallel to `entries`, strictly increasing.
    ids: Vec<u64>,
    next_id: u64,
}

impl ReasoningLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
        self.ids.push(self.next_id);
        self.next_id += 1;
    }

    /// Drop every [`THINKING`] placeholder, then append the backend trace as
    /// `Reasoning: ...` lines and the final `Answer: ...` (skipped when absent or empty).
    /// The caller holds `&mut self`, so no reader observes the intermediate state.
    pub fn reconcile(&mut self, reasoning: &[String], answer: Option<&str>) {
        self.clear_placeholder();
        for r in reasoning {
            self.push(format!("Reasoning: {}", r));
        }
        if let Some(a) = answer.filter(|a| !a.is_empty()) {
            self.push(format!("Answer: {}", a));
        }
    }

    pub fn clear_placeholder(&mut self) {
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i] == THINKING {
                self.entries.remove(i);
                self.ids.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Mark the current end of the log; see [`ReasoningLog::since`].
    pub fn mark(&self) -> LogMark {
        LogMark(self.next_id)
    }

    /// Entries pushed after `mark` that are still in the log.
    pub fn since(&self, mark: LogMark) -> &[String] {
        let start = self.ids.partition_point(|&id| id < mark.0);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
