use std::fmt;

use super::KEY_SEPARATOR;

/// Identifies a note by its owning category and its name.
///
/// The `"{category}/{name}"` string form exists only at the storage boundary
/// (see [`NoteId::storage_key`]); it is never parsed back. Note names may
/// contain a `/`, category names may not, so distinct ids never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId {
    category: String,
    name: String,
}

impl NoteId {
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same category, different name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self::new(self.category.clone(), name)
    }

    pub fn storage_key(&self) -> String {
        storage_key(&self.category, &self.name)
    }
}

pub(crate) fn storage_key(category: &str, name: &str) -> String {
    format!("{category}{KEY_SEPARATOR}{name}")
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}
