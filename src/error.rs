use thiserror::Error;

use crate::repo::NoteId;

pub type JournalResult<T> = std::result::Result<T, JournalError>;

/// Recoverable failures of repository and tab operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("category '{0}' is empty or already exists")]
    DuplicateCategory(String),
    #[error("category name '{0}' may not contain '/'")]
    InvalidCategoryName(String),
    #[error("category '{0}' not found")]
    CategoryNotFound(String),
    #[error("note '{0}' not found")]
    NoteNotFound(NoteId),
    #[error("note '{0}' is not open in a tab")]
    NotOpen(NoteId),
    #[error("category '{category}' already has a note named '{name}'")]
    NameTaken { category: String, name: String },
}

impl JournalError {
    /// True for both missing-category and missing-note failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            JournalError::CategoryNotFound(_) | JournalError::NoteNotFound(_)
        )
    }
}

pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;

/// Failures surfaced by the workspace controller.
///
/// A `Save` failure leaves the in-memory change applied; only the write to
/// the store was lost.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error("saving journal to storage")]
    Save(#[source] anyhow::Error),
}
