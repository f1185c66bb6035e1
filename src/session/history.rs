//! Ordered record of steps shown and answers given.

use super::{HistoryEntry, Step};
use crate::error::GuidanceError;
use crate::Result;

/// What recording an answer did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerChange {
    /// The answer was recorded on the newest step; a next step must be fetched.
    Recorded,
    /// A past answer was confirmed unchanged; the cursor moved forward.
    Unchanged,
    /// A past answer changed; `removed` later entries were discarded.
    Truncated { removed: usize },
}

/// Step history with a cursor.
///
/// `entries` holds every step the server has generated for the current chain
/// of answers. The cursor is the step the user is looking at; it only lags
/// behind the newest entry after `navigate_back`.
#[derive(Debug, Clone, Default)]
pub struct StepHistory {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl StepHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from server-supplied entries, positioned on the last one.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let cursor = entries.len().saturating_sub(1);
        Self { entries, cursor }
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the step the user is on.
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    /// Index of the newest generated step.
    pub fn newest_index(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Entry at the cursor.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Push a newly generated step.
    ///
    /// `index` must be the next free slot; the cursor moves onto the new entry.
    pub fn append(&mut self, index: usize, step: Step, answer: Option<String>) -> Result<()> {
        if index != self.entries.len() {
            return Err(GuidanceError::OutOfOrderAppend {
                expected: self.entries.len(),
                actual: index,
            });
        }
        self.entries.push(HistoryEntry { step, answer });
        self.cursor = index;
        Ok(())
    }

    /// Record an answer for the step at `index`.
    ///
    /// On the newest step this just stores the answer. On an older step an
    /// unchanged answer moves the cursor forward through the still-valid
    /// history, while a changed answer truncates every later entry, since
    /// those were generated from the old answer.
    pub fn record_answer_at(&mut self, index: usize, value: impl Into<String>) -> Result<AnswerChange> {
        self.check_bounds(index)?;
        let value = value.into();

        if index == self.newest_index() {
            self.entries[index].answer = Some(value);
            self.cursor = index;
            return Ok(AnswerChange::Recorded);
        }

        if self.entries[index].answer.as_deref() == Some(value.as_str()) {
            self.cursor = index + 1;
            return Ok(AnswerChange::Unchanged);
        }

        let removed = self.entries.len() - (index + 1);
        self.entries.truncate(index + 1);
        self.entries[index].answer = Some(value);
        self.cursor = index;
        Ok(AnswerChange::Truncated { removed })
    }

    /// Move back one step, returning the answer given there.
    pub fn navigate_back(&mut self) -> Result<Option<&str>> {
        if self.cursor == 0 {
            return Err(GuidanceError::AtFirstStep);
        }
        self.navigate_to_index(self.cursor - 1)?;
        Ok(self.entries[self.cursor].answer.as_deref())
    }

    /// Move the cursor to `index`.
    pub(crate) fn navigate_to_index(&mut self, index: usize) -> Result<()> {
        self.check_bounds(index)?;
        self.cursor = index;
        Ok(())
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(GuidanceError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}
