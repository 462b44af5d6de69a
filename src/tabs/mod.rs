use crate::error::{JournalError, JournalResult};
use crate::repo::NoteId;

/// Ordered open tabs plus the active pointer.
///
/// Holds references only: opening a tab never creates a note, and nothing
/// here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabManager {
    open: Vec<NoteId>,
    active: Option<NoteId>,
}

impl TabManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless already open, then makes it active.
    pub fn open(&mut self, id: NoteId) {
        if !self.contains(&id) {
            self.open.push(id.clone());
        }
        self.active = Some(id);
    }

    /// Closes `id`; when it was active the first remaining tab takes over.
    pub fn close(&mut self, id: &NoteId) -> bool {
        let Some(position) = self.position(id) else {
            return false;
        };
        self.open.remove(position);
        if self.active.as_ref() == Some(id) {
            self.active = self.open.first().cloned();
        }
        true
    }

    pub fn activate(&mut self, id: &NoteId) -> JournalResult<()> {
        if !self.contains(id) {
            return Err(JournalError::NotOpen(id.clone()));
        }
        self.active = Some(id.clone());
        Ok(())
    }

    /// Swaps `old` for `new` at the same position, carrying the active flag.
    pub fn replace(&mut self, old: &NoteId, new: NoteId) -> bool {
        let Some(position) = self.position(old) else {
            return false;
        };
        if self.active.as_ref() == Some(old) {
            self.active = Some(new.clone());
        }
        self.open[position] = new;
        true
    }

    pub fn list(&self) -> &[NoteId] {
        &self.open
    }

    pub fn active(&self) -> Option<&NoteId> {
        self.active.as_ref()
    }

    pub fn is_active(&self, id: &NoteId) -> bool {
        self.active.as_ref() == Some(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.open.contains(id)
    }

    pub fn position(&self, id: &NoteId) -> Option<usize> {
        self.open.iter().position(|open| open == id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
