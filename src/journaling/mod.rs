//! Deferred side effects of editing: debounce slots and rename-on-edit.

mod debounce;
pub mod rename;

pub use debounce::Debouncer;
pub use rename::{RenameOutcome, RenameSync};
