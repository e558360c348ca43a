use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use circle_types::{RecordId, TimeStamp};

use crate::adapter::{DocumentStore, Kind};
use crate::error::{Error, Result};
use crate::friends::PairLocks;
use crate::memory::MemoryStore;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Typed facade over a [`DocumentStore`]. Cheap to clone; all clones share
/// the same backend.
#[derive(Clone)]
pub struct Store {
    docs: Arc<dyn DocumentStore>,
    pair_locks: Arc<PairLocks>,
    token_ttl_ms: TimeStamp,
}

impl Store {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            pair_locks: Arc::new(PairLocks::default()),
            token_ttl_ms: DEFAULT_TOKEN_TTL.as_millis() as TimeStamp,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl_ms = ttl.as_millis() as TimeStamp;
        self
    }

    pub fn token_ttl_ms(&self) -> TimeStamp {
        self.token_ttl_ms
    }

    pub fn documents(&self) -> &dyn DocumentStore {
        self.docs.as_ref()
    }

    pub(crate) fn pair_locks(&self) -> &PairLocks {
        &self.pair_locks
    }

    pub(crate) fn load<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> Result<Option<T>> {
        match self.docs.get(kind, id)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn require<T: DeserializeOwned>(
        &self,
        kind: Kind,
        id: &str,
        what: &'static str,
    ) -> Result<T> {
        self.load(kind, id)?.ok_or(Error::NotFound(what))
    }

    pub(crate) fn load_many<T: DeserializeOwned>(
        &self,
        kind: Kind,
        ids: &[RecordId],
    ) -> Result<Vec<T>> {
        self.docs
            .get_many(kind, ids)?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(Error::from))
            .collect()
    }

    pub(crate) fn save<T: Serialize>(&self, kind: Kind, id: &str, value: &T) -> Result<()> {
        self.docs.put(kind, id, &serde_json::to_value(value)?)?;
        Ok(())
    }

    /// Insert a fresh document. Fails with [`Error::Conflict`] if the id is taken.
    pub(crate) fn create<T: Serialize>(&self, kind: Kind, id: &str, value: &T) -> Result<()> {
        if !self.docs.insert(kind, id, &serde_json::to_value(value)?)? {
            return Err(Error::conflict(format!("{} {} already exists", kind.as_str(), id)));
        }
        Ok(())
    }

    /// Typed read-modify-write. `f` returns whether it changed the value.
    /// Returns the value as it stands afterwards, or `None` if it does not exist.
    pub(crate) fn update<T, F>(&self, kind: Kind, id: &str, mut f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(&mut T) -> bool,
    {
        let mut failure: Option<serde_json::Error> = None;
        let mut current: Option<T> = None;

        self.docs.modify(kind, id, &mut |doc| {
            let mut value: T = match serde_json::from_value(doc.clone()) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };
            let changed = f(&mut value);
            if changed {
                match serde_json::to_value(&value) {
                    Ok(encoded) => *doc = encoded,
                    Err(e) => {
                        failure = Some(e);
                        return false;
                    }
                }
            }
            current = Some(value);
            changed
        })?;

        if let Some(e) = failure {
            return Err(e.into());
        }
        Ok(current)
    }
}
