//! Persistence of the journal as three named slots in a flat key-value table.
//!
//! | slot      | contents                                             |
//! |-----------|------------------------------------------------------|
//! | `journal` | category name -> ordered note names                  |
//! | `pages`   | `"{category}/{name}"` -> HTML body                   |
//! | `dates`   | `"{category}/{name}"` -> RFC 3339 creation timestamp |
//!
//! Loading never fails: a slot that is missing, unreadable or structurally
//! invalid is treated as empty. Saving writes all three slots in one batch.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use strum::{AsRefStr, Display};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::repo::{NoteRepository, KEY_SEPARATOR};

mod schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Slot {
    Journal,
    Pages,
    Dates,
}

/// A flat string key-value surface holding the journal slots.
pub trait SlotStore {
    fn read_slot(&self, slot: Slot) -> Result<Option<String>>;

    /// Writes every entry or none of them.
    fn write_slots(&self, entries: &[(Slot, String)]) -> Result<()>;
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }
}

impl SlotStore for StorageHandle {
    fn read_slot(&self, slot: Slot) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT value FROM slots WHERE name = ?1",
                params![slot.as_ref()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("reading slot {slot}"))
        })
    }

    fn write_slots(&self, entries: &[(Slot, String)]) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("starting slot write")?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        for (slot, value) in entries {
            tx.execute(
                "INSERT INTO slots (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value,
                                                 updated_at = excluded.updated_at",
                params![slot.as_ref(), value, now],
            )
            .with_context(|| format!("writing slot {slot}"))?;
        }
        tx.commit().context("committing slot write")?;
        Ok(())
    }
}

/// Process-local slots, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<Slot, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, slot: Slot) -> Option<String> {
        self.slots.borrow().get(&slot).cloned()
    }

    pub fn put_raw(&self, slot: Slot, value: impl Into<String>) {
        self.slots.borrow_mut().insert(slot, value.into());
    }
}

impl SlotStore for MemoryStore {
    fn read_slot(&self, slot: Slot) -> Result<Option<String>> {
        Ok(self.raw(slot))
    }

    fn write_slots(&self, entries: &[(Slot, String)]) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        for (slot, value) in entries {
            slots.insert(*slot, value.clone());
        }
        Ok(())
    }
}

/// Reads all three slots and rebuilds the repository from them.
pub fn load_all(store: &dyn SlotStore) -> NoteRepository {
    let tree = read_json::<IndexMap<String, Vec<String>>>(store, Slot::Journal)
        .and_then(|tree| match validate_tree(&tree) {
            Ok(()) => Some(tree),
            Err(err) => {
                tracing::warn!(%err, "category slot is malformed, starting empty");
                None
            }
        })
        .unwrap_or_default();
    let pages = read_json::<HashMap<String, String>>(store, Slot::Pages).unwrap_or_default();
    let dates = read_json::<HashMap<String, String>>(store, Slot::Dates)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, raw)| match OffsetDateTime::parse(&raw, &Rfc3339) {
            Ok(at) => Some((key, at)),
            Err(err) => {
                tracing::warn!(%key, %raw, %err, "dropping unparsable creation timestamp");
                None
            }
        })
        .collect::<HashMap<_, _>>();

    let repo = NoteRepository::restore(tree, pages, dates);
    tracing::debug!(
        categories = repo.categories().count(),
        notes = repo.note_count(),
        "loaded journal"
    );
    repo
}

/// Serialises the repository and writes all three slots in one batch.
pub fn save_all(store: &dyn SlotStore, repo: &NoteRepository) -> Result<()> {
    let tree = serde_json::to_string(repo.tree()).context("serialising category slot")?;
    let mut pages = BTreeMap::new();
    for (id, body) in repo.bodies() {
        if pages.insert(id.storage_key(), body.as_str()).is_some() {
            bail!("note {id} shares its storage key with another note");
        }
    }
    let pages = serde_json::to_string(&pages).context("serialising body slot")?;
    let mut dates = BTreeMap::new();
    for (id, at) in repo.timestamps() {
        let formatted = at
            .format(&Rfc3339)
            .with_context(|| format!("formatting creation time of {id}"))?;
        dates.insert(id.storage_key(), formatted);
    }
    let dates = serde_json::to_string(&dates).context("serialising timestamp slot")?;

    store.write_slots(&[
        (Slot::Journal, tree),
        (Slot::Pages, pages),
        (Slot::Dates, dates),
    ])?;
    tracing::debug!(notes = repo.note_count(), "saved journal");
    Ok(())
}

fn read_json<T: DeserializeOwned>(store: &dyn SlotStore, slot: Slot) -> Option<T> {
    let raw = match store.read_slot(slot) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(?err, %slot, "slot unreadable, treating as empty");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(%err, %slot, "slot is not valid, treating as empty");
            None
        }
    }
}

fn validate_tree(tree: &IndexMap<String, Vec<String>>) -> Result<()> {
    for (category, names) in tree {
        if category.trim().is_empty() {
            bail!("empty category name");
        }
        if category.contains(KEY_SEPARATOR) {
            bail!("category name '{category}' contains '{KEY_SEPARATOR}'");
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.is_empty() {
                bail!("empty note name in category '{category}'");
            }
            if !seen.insert(name.as_str()) {
                bail!("duplicate note '{name}' in category '{category}'");
            }
        }
    }
    Ok(())
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}
