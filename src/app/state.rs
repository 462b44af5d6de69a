use time::OffsetDateTime;

use crate::repo::NoteId;
use crate::text::TextStats;

/// Everything a render layer needs to redraw tree, tab strip and editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceSnapshot {
    pub tree: Vec<CategoryView>,
    pub tabs: Vec<TabView>,
    pub editor: Option<EditorView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryView {
    pub name: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub id: NoteId,
    pub active: bool,
}

impl TabView {
    pub fn title(&self) -> &str {
        self.id.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorView {
    pub id: NoteId,
    pub body: String,
    pub created_at: Option<OffsetDateTime>,
    pub stats: TextStats,
}

/// What a call to `tick` or `flush` actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub renamed: Option<(NoteId, NoteId)>,
    pub saved: bool,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.renamed.is_none() && !self.saved
    }
}

impl WorkspaceSnapshot {
    /// Position of the active tab in the strip.
    pub fn active_tab(&self) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.active)
    }

    /// Notes in display order, flattened across categories.
    pub fn note_ids(&self) -> Vec<NoteId> {
        self.tree
            .iter()
            .flat_map(|category| {
                category
                    .notes
                    .iter()
                    .map(|name| NoteId::new(category.name.clone(), name.clone()))
            })
            .collect()
    }
}
