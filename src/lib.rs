pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod journaling;
pub mod repo;
pub mod storage;
pub mod tabs;
pub mod text;

pub use app::Workspace;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{JournalError, JournalResult, WorkspaceError};
pub use repo::{NoteId, NoteRepository};
pub use storage::{MemoryStore, SlotStore, StorageHandle};
