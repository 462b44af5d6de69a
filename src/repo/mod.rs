//! In-memory category/note tree with note bodies and creation timestamps.
//!
//! All mutations go through [`NoteRepository`]; callers only ever read
//! through the accessors. Bodies and timestamps are keyed by [`NoteId`] and
//! every key always corresponds to a name listed under its category.

use std::collections::HashMap;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::error::{JournalError, JournalResult};

mod id;

pub use id::NoteId;
pub(crate) use id::storage_key;

pub const UNTITLED: &str = "Untitled";

/// Separator of the stored `"{category}/{name}"` keys. Category names never
/// contain it, so every key splits back into exactly one note.
pub const KEY_SEPARATOR: char = '/';

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteRepository {
    categories: IndexMap<String, Vec<String>>,
    bodies: HashMap<NoteId, String>,
    created: HashMap<NoteId, OffsetDateTime>,
}

impl NoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a repository from persisted slots.
    ///
    /// Slot keys are matched against the tree, never parsed. Entries without a
    /// matching note are dropped and notes without a body get the default one.
    pub fn restore(
        tree: IndexMap<String, Vec<String>>,
        mut pages: HashMap<String, String>,
        mut dates: HashMap<String, OffsetDateTime>,
    ) -> Self {
        let mut bodies = HashMap::new();
        let mut created = HashMap::new();
        for (category, names) in &tree {
            for name in names {
                let key = storage_key(category, name);
                let id = NoteId::new(category.clone(), name.clone());
                let body = pages.remove(&key).unwrap_or_else(|| {
                    tracing::warn!(note = %id, "note has no stored body, using default");
                    default_body(name)
                });
                bodies.insert(id.clone(), body);
                if let Some(at) = dates.remove(&key) {
                    created.insert(id, at);
                }
            }
        }
        for key in pages.keys() {
            tracing::warn!(%key, "dropping stored body without a matching note");
        }
        for key in dates.keys() {
            tracing::warn!(%key, "dropping stored timestamp without a matching note");
        }
        Self {
            categories: tree,
            bodies,
            created,
        }
    }

    pub fn create_category(&mut self, name: &str) -> JournalResult<()> {
        let name = name.trim();
        if name.is_empty() || self.categories.contains_key(name) {
            return Err(JournalError::DuplicateCategory(name.to_string()));
        }
        if name.contains(KEY_SEPARATOR) {
            return Err(JournalError::InvalidCategoryName(name.to_string()));
        }
        self.categories.insert(name.to_string(), Vec::new());
        tracing::info!(category = name, "created category");
        Ok(())
    }

    /// Removes a category with all of its notes and returns the removed ids.
    pub fn delete_category(&mut self, name: &str) -> JournalResult<Vec<NoteId>> {
        let names = self
            .categories
            .shift_remove(name)
            .ok_or_else(|| JournalError::CategoryNotFound(name.to_string()))?;
        let removed = names
            .into_iter()
            .map(|note| NoteId::new(name, note))
            .collect::<Vec<_>>();
        for id in &removed {
            self.bodies.remove(id);
            self.created.remove(id);
        }
        tracing::info!(category = name, notes = removed.len(), "deleted category");
        Ok(removed)
    }

    pub fn create_note(&mut self, category: &str) -> JournalResult<NoteId> {
        self.create_note_at(category, OffsetDateTime::now_utc())
    }

    pub fn create_note_at(
        &mut self,
        category: &str,
        created_at: OffsetDateTime,
    ) -> JournalResult<NoteId> {
        let names = self
            .categories
            .get_mut(category)
            .ok_or_else(|| JournalError::CategoryNotFound(category.to_string()))?;
        let name = next_untitled_name(names);
        names.push(name.clone());
        let id = NoteId::new(category, name);
        self.bodies.insert(id.clone(), default_body(id.name()));
        self.created.insert(id.clone(), created_at);
        tracing::info!(note = %id, "created note");
        Ok(id)
    }

    pub fn delete_note(&mut self, id: &NoteId) -> JournalResult<()> {
        let names = self
            .categories
            .get_mut(id.category())
            .ok_or_else(|| JournalError::NoteNotFound(id.clone()))?;
        let position = names
            .iter()
            .position(|name| name == id.name())
            .ok_or_else(|| JournalError::NoteNotFound(id.clone()))?;
        names.remove(position);
        self.bodies.remove(id);
        self.created.remove(id);
        tracing::info!(note = %id, "deleted note");
        Ok(())
    }

    /// Renames a note in place and moves its body and timestamp to the new id.
    pub fn rename_note(&mut self, id: &NoteId, new_name: &str) -> JournalResult<NoteId> {
        let names = self
            .categories
            .get_mut(id.category())
            .ok_or_else(|| JournalError::NoteNotFound(id.clone()))?;
        let position = names
            .iter()
            .position(|name| name == id.name())
            .ok_or_else(|| JournalError::NoteNotFound(id.clone()))?;
        if new_name == id.name() {
            return Ok(id.clone());
        }
        if names.iter().any(|name| name == new_name) {
            return Err(JournalError::NameTaken {
                category: id.category().to_string(),
                name: new_name.to_string(),
            });
        }
        names[position] = new_name.to_string();
        let renamed = id.with_name(new_name);
        if let Some(body) = self.bodies.remove(id) {
            self.bodies.insert(renamed.clone(), body);
        }
        if let Some(at) = self.created.remove(id) {
            self.created.insert(renamed.clone(), at);
        }
        tracing::info!(from = %id, to = %renamed, "renamed note");
        Ok(renamed)
    }

    pub fn body(&self, id: &NoteId) -> Option<&str> {
        self.bodies.get(id).map(String::as_str)
    }

    pub fn set_body(&mut self, id: &NoteId, html: &str) -> JournalResult<()> {
        let body = self
            .bodies
            .get_mut(id)
            .ok_or_else(|| JournalError::NoteNotFound(id.clone()))?;
        body.clear();
        body.push_str(html);
        Ok(())
    }

    pub fn created_at(&self, id: &NoteId) -> Option<OffsetDateTime> {
        self.created.get(id).copied()
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.bodies.contains_key(id)
    }

    pub fn has_category(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn notes_in(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn note_ids_in(&self, category: &str) -> Vec<NoteId> {
        self.notes_in(category)
            .unwrap_or_default()
            .iter()
            .map(|name| NoteId::new(category, name.clone()))
            .collect()
    }

    pub fn note_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn name_taken(&self, category: &str, name: &str) -> bool {
        self.notes_in(category)
            .map(|names| names.iter().any(|existing| existing == name))
            .unwrap_or(false)
    }

    pub(crate) fn tree(&self) -> &IndexMap<String, Vec<String>> {
        &self.categories
    }

    pub(crate) fn bodies(&self) -> impl Iterator<Item = (&NoteId, &String)> {
        self.bodies.iter()
    }

    pub(crate) fn timestamps(&self) -> impl Iterator<Item = (&NoteId, &OffsetDateTime)> {
        self.created.iter()
    }
}

pub fn default_body(name: &str) -> String {
    format!("<h1>{name}</h1>")
}

/// `"Untitled {count + 1}"`, bumped past any name already in use.
fn next_untitled_name(names: &[String]) -> String {
    let mut n = names.len() + 1;
    loop {
        let candidate = format!("{UNTITLED} {n}");
        if !names.iter().any(|name| *name == candidate) {
            return candidate;
        }
        n += 1;
    }
}
