//! The workspace controller: one owner for the note tree, the open tabs, the
//! store and the two debounce slots.
//!
//! Structural operations (create/delete) apply and save synchronously. Edits
//! only touch the active note's body and restart the rename and save slots,
//! which fire from [`Workspace::tick_at`] once their quiet periods elapse.
//!
//! A pending rename always targets the active note: every change of the
//! active pointer first settles it, and closing or deleting the note drops it.

use std::time::Instant;

use time::OffsetDateTime;

use crate::config::DebounceConfig;
use crate::error::{JournalError, WorkspaceError, WorkspaceResult};
use crate::journaling::{Debouncer, RenameOutcome, RenameSync};
use crate::repo::{NoteId, NoteRepository};
use crate::storage::{self, SlotStore};
use crate::tabs::TabManager;
use crate::text::{self, TextStats};

pub mod state;

pub use state::{CategoryView, EditorView, TabView, TickReport, WorkspaceSnapshot};

pub struct Workspace {
    repo: NoteRepository,
    tabs: TabManager,
    store: Box<dyn SlotStore>,
    rename: RenameSync,
    save: Debouncer<()>,
}

impl Workspace {
    /// Loads the journal from `store`; malformed slots start out empty.
    pub fn load(store: Box<dyn SlotStore>, debounce: &DebounceConfig) -> Self {
        let repo = storage::load_all(store.as_ref());
        Self {
            repo,
            tabs: TabManager::new(),
            store,
            rename: RenameSync::new(debounce.rename_quiet()),
            save: Debouncer::new(debounce.save_quiet()),
        }
    }

    pub fn create_category(&mut self, name: &str) -> WorkspaceResult<()> {
        self.repo.create_category(name)?;
        self.persist_now()
    }

    /// Closes the category's tabs, then removes it with all of its notes.
    pub fn delete_category(&mut self, name: &str) -> WorkspaceResult<Vec<NoteId>> {
        if !self.repo.has_category(name) {
            return Err(JournalError::CategoryNotFound(name.to_string()).into());
        }
        for id in self.repo.note_ids_in(name) {
            self.close(&id);
        }
        let removed = self.repo.delete_category(name)?;
        self.persist_now()?;
        Ok(removed)
    }

    /// Creates a note with default name and body and opens it as the active tab.
    pub fn create_note(&mut self, category: &str) -> WorkspaceResult<NoteId> {
        let id = self.repo.create_note(category)?;
        self.persist_now()?;
        self.open(&id)?;
        Ok(id)
    }

    pub fn delete_note(&mut self, id: &NoteId) -> WorkspaceResult<()> {
        if !self.repo.contains(id) {
            return Err(JournalError::NoteNotFound(id.clone()).into());
        }
        self.close(id);
        self.repo.delete_note(id)?;
        self.persist_now()
    }

    /// Opens `id` in a tab (appending it when new) and makes it active.
    pub fn open(&mut self, id: &NoteId) -> WorkspaceResult<()> {
        if !self.repo.contains(id) {
            return Err(JournalError::NoteNotFound(id.clone()).into());
        }
        self.settle_before_switch(id)?;
        self.tabs.open(id.clone());
        Ok(())
    }

    pub fn activate(&mut self, id: &NoteId) -> WorkspaceResult<()> {
        if !self.tabs.contains(id) {
            return Err(JournalError::NotOpen(id.clone()).into());
        }
        self.settle_before_switch(id)?;
        self.tabs.activate(id)?;
        Ok(())
    }

    /// Closes the tab for `id`, dropping any rename still pending for it.
    pub fn close(&mut self, id: &NoteId) -> bool {
        if self.rename.invalidate(id) {
            tracing::debug!(note = %id, "dropped pending rename for closed tab");
        }
        self.tabs.close(id)
    }

    /// Stores edited content for the active note and restarts both debounce slots.
    ///
    /// Returns `false` when no tab is active.
    pub fn edit_active(&mut self, html: &str) -> WorkspaceResult<bool> {
        self.edit_active_at(html, Instant::now())
    }

    pub fn edit_active_at(&mut self, html: &str, now: Instant) -> WorkspaceResult<bool> {
        let Some(id) = self.tabs.active().cloned() else {
            return Ok(false);
        };
        self.repo.set_body(&id, html)?;
        self.rename.on_edit(&id, now);
        self.save.schedule((), now);
        tracing::trace!(note = %id, "edit scheduled rename and save");
        Ok(true)
    }

    pub fn poll(&mut self) -> WorkspaceResult<TickReport> {
        self.tick_at(Instant::now())
    }

    /// Runs whichever debounced tasks are due at `now`, rename first.
    pub fn tick_at(&mut self, now: Instant) -> WorkspaceResult<TickReport> {
        let mut report = TickReport::default();
        if let Some(id) = self.rename.take_due(now) {
            report.renamed = self.run_rename(&id)?;
            report.saved |= report.renamed.is_some();
        }
        if self.save.take_due(now).is_some() {
            self.persist_now()?;
            report.saved = true;
        }
        Ok(report)
    }

    /// Runs every pending task immediately, e.g. before shutting down.
    pub fn flush(&mut self) -> WorkspaceResult<TickReport> {
        let mut report = TickReport::default();
        if let Some(id) = self.rename.take() {
            report.renamed = self.run_rename(&id)?;
            report.saved |= report.renamed.is_some();
        }
        if self.save.take().is_some() {
            self.persist_now()?;
            report.saved = true;
        }
        Ok(report)
    }

    pub fn list_categories(&self) -> Vec<&str> {
        self.repo.categories().collect()
    }

    pub fn list_notes_in(&self, category: &str) -> Option<&[String]> {
        self.repo.notes_in(category)
    }

    pub fn list_open_tabs(&self) -> &[NoteId] {
        self.tabs.list()
    }

    pub fn active(&self) -> Option<&NoteId> {
        self.tabs.active()
    }

    pub fn body(&self, id: &NoteId) -> Option<&str> {
        self.repo.body(id)
    }

    pub fn created_at(&self, id: &NoteId) -> Option<OffsetDateTime> {
        self.repo.created_at(id)
    }

    pub fn stats(&self, id: &NoteId) -> Option<TextStats> {
        self.repo
            .body(id)
            .map(|body| text::stats(&text::plain_text(body)))
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.repo.contains(id)
    }

    pub fn has_pending_rename(&self) -> bool {
        self.rename.pending().is_some()
    }

    pub fn has_pending_save(&self) -> bool {
        self.save.is_pending()
    }

    /// Earliest instant at which `tick_at` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.rename.deadline(), self.save.deadline()) {
            (Some(rename), Some(save)) => Some(rename.min(save)),
            (rename, save) => rename.or(save),
        }
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        let tree = self
            .repo
            .categories()
            .map(|name| CategoryView {
                name: name.to_string(),
                notes: self.repo.notes_in(name).unwrap_or_default().to_vec(),
            })
            .collect();
        let tabs = self
            .tabs
            .list()
            .iter()
            .map(|id| TabView {
                id: id.clone(),
                active: self.tabs.is_active(id),
            })
            .collect();
        let editor = self.tabs.active().and_then(|id| {
            let body = self.repo.body(id)?;
            Some(EditorView {
                id: id.clone(),
                body: body.to_string(),
                created_at: self.repo.created_at(id),
                stats: text::stats(&text::plain_text(body)),
            })
        });
        WorkspaceSnapshot { tree, tabs, editor }
    }

    /// Settles a pending rename of the active note before focus moves to `next`.
    fn settle_before_switch(&mut self, next: &NoteId) -> WorkspaceResult<()> {
        if self.tabs.is_active(next) {
            return Ok(());
        }
        if let Some(id) = self.rename.take() {
            self.run_rename(&id)?;
        }
        Ok(())
    }

    fn run_rename(&mut self, id: &NoteId) -> WorkspaceResult<Option<(NoteId, NoteId)>> {
        match RenameSync::apply(&mut self.repo, &mut self.tabs, id)? {
            RenameOutcome::Renamed { from, to } => {
                self.persist_now()?;
                Ok(Some((from, to)))
            }
            RenameOutcome::Unchanged => Ok(None),
            RenameOutcome::Skipped => {
                tracing::debug!(note = %id, "rename check skipped, note gone or inactive");
                Ok(None)
            }
        }
    }

    /// Writes all slots now; a pending debounced save is subsumed.
    fn persist_now(&mut self) -> WorkspaceResult<()> {
        self.save.cancel();
        storage::save_all(self.store.as_ref(), &self.repo).map_err(WorkspaceError::Save)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use std::time::Duration;

    use anyhow::Result;
    use assert_matches::assert_matches;

    use super::*;
    use crate::storage::{MemoryStore, Slot};

    const RENAME: Duration = Duration::from_millis(500);
    const SAVE: Duration = Duration::from_millis(800);

    /// Shares one in-memory store between the workspace and the test body.
    #[derive(Clone, Default)]
    struct SharedStore(Rc<MemoryStore>);

    impl SlotStore for SharedStore {
        fn read_slot(&self, slot: Slot) -> anyhow::Result<Option<String>> {
            self.0.read_slot(slot)
        }

        fn write_slots(&self, entries: &[(Slot, String)]) -> anyhow::Result<()> {
            self.0.write_slots(entries)
        }
    }

    fn debounce() -> DebounceConfig {
        DebounceConfig {
            rename_ms: RENAME.as_millis() as u64,
            save_ms: SAVE.as_millis() as u64,
        }
    }

    fn workspace() -> (Workspace, SharedStore) {
        let store = SharedStore::default();
        let ws = Workspace::load(Box::new(store.clone()), &debounce());
        (ws, store)
    }

    fn reload(store: &SharedStore) -> Workspace {
        Workspace::load(Box::new(store.clone()), &debounce())
    }

    #[test]
    fn edit_then_quiet_period_renames_active_note_in_place() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        let id = ws.create_note("Work")?;
        assert_eq!(id, NoteId::new("Work", "Untitled 1"));
        assert_eq!(ws.body(&id), Some("<h1>Untitled 1</h1>"));
        ws.open(&id)?;

        let start = Instant::now();
        ws.edit_active_at("<h1>Project Plan</h1><p>goals</p>", start)?;
        assert!(ws.tick_at(start + RENAME / 2)?.is_idle());

        let report = ws.tick_at(start + RENAME)?;
        let renamed = NoteId::new("Work", "Project Plan");
        assert_eq!(report.renamed, Some((id.clone(), renamed.clone())));
        assert_eq!(ws.list_open_tabs(), &[renamed.clone()]);
        assert_eq!(ws.active(), Some(&renamed));
        assert!(!ws.contains(&id));

        let reloaded = reload(&store);
        assert_eq!(reloaded.list_notes_in("Work"), Some(&["Project Plan".to_string()][..]));
        assert_eq!(reloaded.body(&renamed), Some("<h1>Project Plan</h1><p>goals</p>"));
        Ok(())
    }

    #[test]
    fn rename_keeps_tab_position_among_others() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        let b = ws.create_note("Work")?;
        let c = ws.create_note("Work")?;
        ws.activate(&b)?;

        let start = Instant::now();
        ws.edit_active_at("<h1>Middle</h1>", start)?;
        ws.tick_at(start + RENAME)?;
        let middle = NoteId::new("Work", "Middle");
        assert_eq!(ws.list_open_tabs(), &[a, middle.clone(), c]);
        assert_eq!(ws.active(), Some(&middle));
        Ok(())
    }

    #[test]
    fn edits_restart_both_quiet_periods() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        let id = ws.create_note("Work")?;
        let start = Instant::now();
        ws.edit_active_at("<h1>Draft</h1>", start)?;
        ws.edit_active_at("<h1>Draft two</h1>", start + Duration::from_millis(400))?;

        assert!(ws.tick_at(start + RENAME)?.is_idle());
        let report = ws.tick_at(start + Duration::from_millis(900))?;
        assert_eq!(
            report.renamed,
            Some((id, NoteId::new("Work", "Draft two")))
        );
        // rename saved synchronously, so the pending save was subsumed
        assert!(!ws.has_pending_save());
        assert!(store.0.raw(Slot::Pages).unwrap().contains("Draft two"));
        Ok(())
    }

    #[test]
    fn debounced_save_writes_bodies_after_quiet_period() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        let id = ws.create_note("Work")?;
        let start = Instant::now();
        ws.edit_active_at("<h1>Untitled 1</h1><p>more</p>", start)?;
        assert_eq!(ws.next_deadline(), Some(start + RENAME));

        ws.tick_at(start + RENAME)?;
        assert_eq!(ws.next_deadline(), Some(start + SAVE));
        assert!(ws.has_pending_save());
        assert!(!store.0.raw(Slot::Pages).unwrap().contains("more"));

        let report = ws.tick_at(start + SAVE)?;
        assert!(report.saved && report.renamed.is_none());
        assert_eq!(reload(&store).body(&id), Some("<h1>Untitled 1</h1><p>more</p>"));
        Ok(())
    }

    #[test]
    fn edit_without_active_tab_is_ignored() -> Result<()> {
        let (mut ws, _store) = workspace();
        assert!(!ws.edit_active_at("<p>x</p>", Instant::now())?);
        assert!(!ws.has_pending_rename() && !ws.has_pending_save());
        Ok(())
    }

    #[test]
    fn closing_active_tab_picks_first_remaining() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        let b = ws.create_note("Work")?;
        let c = ws.create_note("Work")?;
        ws.activate(&b)?;

        assert!(ws.close(&b));
        assert_eq!(ws.active(), Some(&a));
        assert_eq!(ws.list_open_tabs(), &[a, c]);
        Ok(())
    }

    #[test]
    fn activate_changes_focus_but_not_order() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        let b = ws.create_note("Work")?;
        ws.activate(&a)?;

        ws.activate(&b)?;
        assert_eq!(ws.active(), Some(&b));
        assert_eq!(ws.list_open_tabs(), &[a, b]);
        Ok(())
    }

    #[test]
    fn activating_a_closed_tab_fails() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        ws.close(&a);
        assert_matches!(
            ws.activate(&a),
            Err(WorkspaceError::Journal(JournalError::NotOpen(id))) if id == a
        );
        Ok(())
    }

    #[test]
    fn opening_unknown_note_never_creates_it() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let ghost = NoteId::new("Work", "ghost");
        assert_matches!(
            ws.open(&ghost),
            Err(WorkspaceError::Journal(JournalError::NoteNotFound(_)))
        );
        assert!(ws.list_open_tabs().is_empty());
        assert_eq!(ws.list_notes_in("Work"), Some(&[][..]));
        Ok(())
    }

    #[test]
    fn deleting_category_closes_its_tabs_first() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        ws.create_category("Home")?;
        let home = ws.create_note("Home")?;
        let w1 = ws.create_note("Work")?;
        let w2 = ws.create_note("Work")?;
        ws.activate(&w1)?;

        let removed = ws.delete_category("Work")?;
        assert_eq!(removed, vec![w1, w2]);
        assert_eq!(ws.list_open_tabs(), &[home.clone()]);
        assert_eq!(ws.active(), Some(&home));
        assert_eq!(ws.list_categories(), vec!["Home"]);
        assert_eq!(reload(&store).list_categories(), vec!["Home"]);
        Ok(())
    }

    #[test]
    fn deleting_note_cancels_its_pending_rename() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        let id = ws.create_note("Work")?;
        let start = Instant::now();
        ws.edit_active_at("<h1>Doomed</h1>", start)?;

        ws.delete_note(&id)?;
        assert!(!ws.has_pending_rename());
        assert!(!ws.has_pending_save());
        assert!(ws.tick_at(start + SAVE)?.is_idle());

        let reloaded = reload(&store);
        assert_eq!(reloaded.list_notes_in("Work"), Some(&[][..]));
        assert!(!store.0.raw(Slot::Dates).unwrap().contains("Untitled 1"));
        Ok(())
    }

    #[test]
    fn closing_tab_drops_pending_rename() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let id = ws.create_note("Work")?;
        let start = Instant::now();
        ws.edit_active_at("<h1>Never applied</h1>", start)?;

        ws.close(&id);
        let report = ws.tick_at(start + SAVE)?;
        assert_eq!(report.renamed, None);
        assert!(report.saved);
        assert!(ws.contains(&id));
        Ok(())
    }

    #[test]
    fn switching_tabs_settles_pending_rename_first() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        let b = ws.create_note("Work")?;
        ws.activate(&a)?;
        ws.edit_active_at("<h1>Alpha</h1>", Instant::now())?;

        ws.activate(&b)?;
        let alpha = NoteId::new("Work", "Alpha");
        assert!(!ws.has_pending_rename());
        assert_eq!(ws.list_open_tabs(), &[alpha, b.clone()]);
        assert_eq!(ws.active(), Some(&b));
        Ok(())
    }

    #[test]
    fn structural_operations_save_immediately() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        assert_eq!(reload(&store).list_categories(), vec!["Work"]);

        let id = ws.create_note("Work")?;
        let reloaded = reload(&store);
        assert!(reloaded.contains(&id));
        assert!(reloaded.created_at(&id).is_some());
        assert!(reloaded.list_open_tabs().is_empty());

        ws.delete_note(&id)?;
        assert!(!reload(&store).contains(&id));
        Ok(())
    }

    #[test]
    fn structural_errors_are_reported() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        assert_matches!(
            ws.create_category("Work"),
            Err(WorkspaceError::Journal(JournalError::DuplicateCategory(_)))
        );
        assert_matches!(
            ws.delete_category("Nope"),
            Err(WorkspaceError::Journal(err)) if err.is_not_found()
        );
        assert_matches!(
            ws.create_note("Nope"),
            Err(WorkspaceError::Journal(JournalError::CategoryNotFound(_)))
        );
        assert_matches!(
            ws.delete_note(&NoteId::new("Work", "ghost")),
            Err(WorkspaceError::Journal(JournalError::NoteNotFound(_)))
        );
        Ok(())
    }

    #[test]
    fn flush_runs_pending_work_immediately() -> Result<()> {
        let (mut ws, store) = workspace();
        ws.create_category("Work")?;
        ws.create_note("Work")?;
        ws.edit_active_at("<h1>Flushed</h1>", Instant::now())?;

        let report = ws.flush()?;
        assert_eq!(report.renamed.map(|(_, to)| to), Some(NoteId::new("Work", "Flushed")));
        assert!(report.saved);
        assert!(reload(&store).contains(&NoteId::new("Work", "Flushed")));
        assert!(ws.flush()?.is_idle());
        Ok(())
    }

    #[test]
    fn snapshot_reflects_tree_tabs_and_editor() -> Result<()> {
        let (mut ws, _store) = workspace();
        ws.create_category("Work")?;
        let a = ws.create_note("Work")?;
        let b = ws.create_note("Work")?;
        ws.edit_active_at("<h1>Untitled 2</h1><p>two lines</p>", Instant::now())?;

        let snapshot = ws.snapshot();
        assert_eq!(
            snapshot.tree,
            vec![CategoryView {
                name: "Work".into(),
                notes: vec!["Untitled 1".into(), "Untitled 2".into()],
            }]
        );
        assert_eq!(snapshot.active_tab(), Some(1));
        assert_eq!(snapshot.note_ids(), vec![a, b.clone()]);
        let editor = snapshot.editor.expect("editor view");
        assert_eq!(editor.id, b);
        assert_eq!(editor.stats, TextStats { chars: 20, lines: 2 });
        assert!(editor.created_at.is_some());
        Ok(())
    }
}
