use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use serde_json::Value;

use circle_types::RecordId;

use crate::adapter::{DocumentStore, Kind};

struct Entry {
    seq: u64,
    doc: Value,
}

#[derive(Default)]
struct Documents {
    next_seq: u64,
    entries: HashMap<(Kind, RecordId), Entry>,
}

/// Process-local document store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>> {
        self.docs
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store lock poisoned: {}", e))
    }
}

impl Documents {
    fn key(kind: Kind, id: &str) -> (Kind, RecordId) {
        (kind, id.to_string())
    }

    fn insert_new(&mut self, kind: Kind, id: &str, doc: Value) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(Self::key(kind, id), Entry { seq, doc });
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>> {
        let docs = self.lock()?;
        Ok(docs.entries.get(&Documents::key(kind, id)).map(|e| e.doc.clone()))
    }

    fn get_many(&self, kind: Kind, ids: &[RecordId]) -> Result<Vec<Value>> {
        let docs = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| docs.entries.get(&Documents::key(kind, id)))
            .map(|e| e.doc.clone())
            .collect())
    }

    fn put(&self, kind: Kind, id: &str, doc: &Value) -> Result<()> {
        let mut docs = self.lock()?;
        match docs.entries.get_mut(&Documents::key(kind, id)) {
            Some(entry) => entry.doc = doc.clone(),
            None => docs.insert_new(kind, id, doc.clone()),
        }
        Ok(())
    }

    fn insert(&self, kind: Kind, id: &str, doc: &Value) -> Result<bool> {
        let mut docs = self.lock()?;
        if docs.entries.contains_key(&Documents::key(kind, id)) {
            return Ok(false);
        }
        docs.insert_new(kind, id, doc.clone());
        Ok(true)
    }

    fn delete(&self, kind: Kind, id: &str) -> Result<bool> {
        let mut docs = self.lock()?;
        Ok(docs.entries.remove(&Documents::key(kind, id)).is_some())
    }

    fn modify(
        &self,
        kind: Kind,
        id: &str,
        f: &mut dyn FnMut(&mut Value) -> bool,
    ) -> Result<Option<bool>> {
        let mut docs = self.lock()?;
        let Some(entry) = docs.entries.get_mut(&Documents::key(kind, id)) else {
            return Ok(None);
        };
        // Work on a copy so a declined change leaves the stored document untouched.
        let mut doc = entry.doc.clone();
        if !f(&mut doc) {
            return Ok(Some(false));
        }
        entry.doc = doc;
        Ok(Some(true))
    }

    fn find_by_field(&self, kind: Kind, field: &str, value: &str) -> Result<Option<Value>> {
        let docs = self.lock()?;
        Ok(docs
            .entries
            .iter()
            .filter(|((k, _), e)| *k == kind && e.doc.get(field).and_then(Value::as_str) == Some(value))
            .min_by_key(|(_, e)| e.seq)
            .map(|(_, e)| e.doc.clone()))
    }

    fn scan(&self, kind: Kind, visit: &mut dyn FnMut(&Value) -> bool) -> Result<()> {
        // Snapshot first so `visit` runs without holding the lock.
        let mut snapshot: Vec<(u64, Value)> = {
            let docs = self.lock()?;
            docs.entries
                .iter()
                .filter(|((k, _), _)| *k == kind)
                .map(|(_, e)| (e.seq, e.doc.clone()))
                .collect()
        };
        snapshot.sort_by_key(|(seq, _)| *seq);
        for (_, doc) in &snapshot {
            if !visit(doc) {
                break;
            }
        }
        Ok(())
    }
}
