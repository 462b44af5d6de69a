use std::time::{Duration, Instant};

use crate::error::JournalResult;
use crate::journaling::Debouncer;
use crate::repo::{NoteId, NoteRepository};
use crate::tabs::TabManager;
use crate::text;

/// Outcome of a rename check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The note already carries its derived name.
    Unchanged,
    /// The note vanished or lost focus before the check ran.
    Skipped,
    Renamed { from: NoteId, to: NoteId },
}

/// Keeps the active note's name in step with the first line of its body.
///
/// Edits restart a single debounce slot; the check runs once typing goes
/// quiet and only against the note the edit was made in.
#[derive(Debug)]
pub struct RenameSync {
    slot: Debouncer<NoteId>,
}

impl RenameSync {
    pub fn new(quiet: Duration) -> Self {
        Self {
            slot: Debouncer::new(quiet),
        }
    }

    pub fn on_edit(&mut self, id: &NoteId, now: Instant) {
        if let Some(previous) = self.slot.schedule(id.clone(), now) {
            if previous != *id {
                tracing::debug!(dropped = %previous, note = %id, "rename check retargeted");
            }
        }
    }

    pub fn pending(&self) -> Option<&NoteId> {
        self.slot.pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.slot.deadline()
    }

    /// Drops the pending check when it targets `id`.
    pub fn invalidate(&mut self, id: &NoteId) -> bool {
        self.slot.cancel_if(|pending| pending == id).is_some()
    }

    pub fn invalidate_all(&mut self) -> bool {
        self.slot.cancel().is_some()
    }

    pub fn take_due(&mut self, now: Instant) -> Option<NoteId> {
        self.slot.take_due(now)
    }

    pub fn take(&mut self) -> Option<NoteId> {
        self.slot.take()
    }

    /// Renames `id` after its derived title and rewrites its tab in place.
    pub fn apply(
        repo: &mut NoteRepository,
        tabs: &mut TabManager,
        id: &NoteId,
    ) -> JournalResult<RenameOutcome> {
        if !tabs.is_active(id) {
            return Ok(RenameOutcome::Skipped);
        }
        let Some(body) = repo.body(id) else {
            return Ok(RenameOutcome::Skipped);
        };
        let title = text::title_from_html(body);
        let Some(name) = target_name(repo, id, &title) else {
            return Ok(RenameOutcome::Unchanged);
        };
        if name != title {
            tracing::warn!(note = %id, %title, chosen = %name, "derived title already in use");
        }
        let renamed = repo.rename_note(id, &name)?;
        tabs.replace(id, renamed.clone());
        Ok(RenameOutcome::Renamed {
            from: id.clone(),
            to: renamed,
        })
    }
}

/// Picks the name `id` should carry for `title`, or `None` to keep the current one.
///
/// A title taken by a sibling gets the first free `"{title} (n)"` suffix,
/// starting at 2. A note that already holds the suffix it would be given is
/// left alone, so repeated checks settle.
pub fn target_name(repo: &NoteRepository, id: &NoteId, title: &str) -> Option<String> {
    if id.name() == title {
        return None;
    }
    if !repo.name_taken(id.category(), title) {
        return Some(title.to_string());
    }
    (2usize..).find_map(|n| {
        let candidate = format!("{title} ({n})");
        if candidate == id.name() {
            Some(None)
        } else if repo.name_taken(id.category(), &candidate) {
            None
        } else {
            Some(Some(candidate))
        }
    })?
}
