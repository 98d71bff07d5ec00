//! PersonStore — lock-guarded in-memory record map.

use std::collections::HashMap;
use std::sync::Arc;

use roster_core::{ObjectId, Person, PersonDraft};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Result of a single upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The id was malformed; nothing was stored.
    Rejected,
}

/// Result of a single delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// The id was malformed; nothing was touched.
    Rejected,
}

/// Per-item tally of a bulk mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Items that changed the store (inserted, updated or deleted).
    pub applied: usize,
    /// Well-formed ids that matched nothing.
    pub not_found: usize,
    /// Malformed ids that were skipped.
    pub rejected: usize,
}

impl BatchOutcome {
    pub fn nothing_matched(&self) -> bool {
        self.applied == 0
    }
}

/// Thread-safe person store.
#[derive(Clone, Default)]
pub struct PersonStore {
    records: Arc<RwLock<HashMap<ObjectId, Person>>>,
}

impl PersonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in no particular order.
    pub async fn list(&self) -> Vec<Person> {
        let records = self.records.read().await;
        if records.is_empty() {
            debug!("no records stored");
        }
        records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Look up one record. Malformed and absent ids both yield `None`.
    pub async fn get(&self, id: &str) -> Option<Person> {
        let key = parse_id(id)?;
        let found = self.records.read().await.get(&key).cloned();
        if found.is_none() {
            debug!(%key, "record not found");
        }
        found
    }

    /// Look up several records, skipping malformed and absent ids.
    pub async fn get_many<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Person> {
        let records = self.records.read().await;
        let found: Vec<Person> = ids
            .iter()
            .filter_map(|id| parse_id(id.as_ref()))
            .filter_map(|key| records.get(&key).cloned())
            .collect();
        if found.is_empty() && !ids.is_empty() {
            debug!(requested = ids.len(), "none of the requested records located");
        }
        found
    }

    /// Insert a record or overwrite name, age and profession of an
    /// existing one.
    pub async fn upsert(&self, draft: PersonDraft) -> UpsertOutcome {
        let mut records = self.records.write().await;
        upsert_locked(&mut records, draft)
    }

    /// Upsert every item independently.
    pub async fn upsert_many(&self, drafts: Vec<PersonDraft>) -> BatchOutcome {
        let mut records = self.records.write().await;
        let mut outcome = BatchOutcome::default();
        for draft in drafts {
            match upsert_locked(&mut records, draft) {
                UpsertOutcome::Inserted | UpsertOutcome::Updated => outcome.applied += 1,
                UpsertOutcome::Rejected => outcome.rejected += 1,
            }
        }
        debug!(applied = outcome.applied, rejected = outcome.rejected, "bulk upsert");
        outcome
    }

    pub async fn delete(&self, id: &str) -> DeleteOutcome {
        let mut records = self.records.write().await;
        delete_locked(&mut records, id)
    }

    /// Delete every matching id. Matching nothing is reported through
    /// [`BatchOutcome::nothing_matched`], not as a failure.
    pub async fn delete_many<S: AsRef<str>>(&self, ids: &[S]) -> BatchOutcome {
        let mut records = self.records.write().await;
        let mut outcome = BatchOutcome::default();
        for id in ids {
            match delete_locked(&mut records, id.as_ref()) {
                DeleteOutcome::Deleted => outcome.applied += 1,
                DeleteOutcome::NotFound => outcome.not_found += 1,
                DeleteOutcome::Rejected => outcome.rejected += 1,
            }
        }
        if outcome.nothing_matched() {
            debug!(requested = ids.len(), "bulk delete matched nothing");
        } else {
            debug!(deleted = outcome.applied, "bulk delete");
        }
        outcome
    }
}

fn parse_id(id: &str) -> Option<ObjectId> {
    match id.parse() {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "rejected malformed id");
            None
        }
    }
}

fn upsert_locked(records: &mut HashMap<ObjectId, Person>, draft: PersonDraft) -> UpsertOutcome {
    let person = match draft.validate() {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "rejected malformed id");
            return UpsertOutcome::Rejected;
        }
    };

    match records.get_mut(&person.id) {
        Some(existing) => {
            existing.name = person.name;
            existing.age = person.age;
            existing.profession = person.profession;
            debug!(key = %existing.id, "record updated");
            UpsertOutcome::Updated
        }
        None => {
            debug!(key = %person.id, "record inserted");
            records.insert(person.id, person);
            UpsertOutcome::Inserted
        }
    }
}

fn delete_locked(records: &mut HashMap<ObjectId, Person>, id: &str) -> DeleteOutcome {
    let Some(key) = parse_id(id) else {
        return DeleteOutcome::Rejected;
    };
    if records.remove(&key).is_some() {
        debug!(%key, "record deleted");
        DeleteOutcome::Deleted
    } else {
        debug!(%key, "record to delete not found");
        DeleteOutcome::NotFound
    }
}
