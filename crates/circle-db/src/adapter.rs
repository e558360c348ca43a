//! Store adapter boundary.
//!
//! Documents are JSON values addressed by `(kind, id)`. Every operation is
//! atomic for one document and nothing more: callers that touch two documents
//! own the ordering between them.

use anyhow::Result;
use serde_json::Value;

use circle_types::{RecordId, next_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    User,
    Token,
    FriendList,
    Chat,
    ChatPost,
    Blog,
    BlogPost,
    NotifList,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Token => "tokens",
            Self::FriendList => "friend_lists",
            Self::Chat => "chats",
            Self::ChatPost => "chat_posts",
            Self::Blog => "blogs",
            Self::BlogPost => "blog_posts",
            Self::NotifList => "notifs",
        }
    }
}

/// Selects list elements for [`DocumentStore::list_remove`].
#[derive(Debug, Clone)]
pub enum ListMatch {
    /// Element equals the value.
    Equals(Value),
    /// Element is an object whose `key` field equals the value.
    Field(&'static str, Value),
}

impl ListMatch {
    pub fn equals(value: impl Into<Value>) -> Self {
        Self::Equals(value.into())
    }

    pub fn field(key: &'static str, value: impl Into<Value>) -> Self {
        Self::Field(key, value.into())
    }

    pub fn matches(&self, element: &Value) -> bool {
        match self {
            Self::Equals(v) => element == v,
            Self::Field(key, v) => element.get(*key) == Some(v),
        }
    }
}

/// Bump a document's `updated` field, if it has one.
pub fn touch(doc: &mut Value) {
    if let Some(updated) = doc.get_mut("updated") {
        let previous = updated.as_i64().unwrap_or_default();
        *updated = Value::from(next_timestamp(previous));
    }
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, kind: Kind, id: &str) -> Result<Option<Value>>;

    /// Documents in the order of `ids`. Missing ids are skipped.
    fn get_many(&self, kind: Kind, ids: &[RecordId]) -> Result<Vec<Value>>;

    /// Insert or overwrite.
    fn put(&self, kind: Kind, id: &str, doc: &Value) -> Result<()>;

    /// Insert only. Returns `false` if the id is taken.
    fn insert(&self, kind: Kind, id: &str, doc: &Value) -> Result<bool>;

    /// Returns `false` if there was nothing to delete.
    fn delete(&self, kind: Kind, id: &str) -> Result<bool>;

    /// Atomic read-modify-write. `f` returns whether it changed the document;
    /// only then is it written back. `None` if the document does not exist.
    fn modify(
        &self,
        kind: Kind,
        id: &str,
        f: &mut dyn FnMut(&mut Value) -> bool,
    ) -> Result<Option<bool>>;

    /// First document whose top-level string `field` equals `value`.
    fn find_by_field(&self, kind: Kind, field: &str, value: &str) -> Result<Option<Value>>;

    /// Visit every document of a kind in insertion order until `visit` returns `false`.
    fn scan(&self, kind: Kind, visit: &mut dyn FnMut(&Value) -> bool) -> Result<()>;

    fn delete_many(&self, kind: Kind, ids: &[RecordId]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete(kind, id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Push `value` onto the array `field` and bump `updated`.
    /// Returns `false` if the document or the array is missing.
    fn list_append(&self, kind: Kind, id: &str, field: &str, value: Value) -> Result<bool> {
        let mut value = Some(value);
        let changed = self.modify(kind, id, &mut |doc| {
            let Some(list) = doc.get_mut(field).and_then(Value::as_array_mut) else {
                return false;
            };
            if let Some(v) = value.take() {
                list.push(v);
            }
            touch(doc);
            true
        })?;
        Ok(changed == Some(true))
    }

    /// Pull every element of the array `field` selected by `matcher`, bumping
    /// `updated` if anything was removed. Returns the number removed.
    fn list_remove(&self, kind: Kind, id: &str, field: &str, matcher: &ListMatch) -> Result<usize> {
        let mut removed = 0;
        self.modify(kind, id, &mut |doc| {
            let Some(list) = doc.get_mut(field).and_then(Value::as_array_mut) else {
                return false;
            };
            let before = list.len();
            list.retain(|element| !matcher.matches(element));
            removed = before - list.len();
            if removed == 0 {
                return false;
            }
            touch(doc);
            true
        })?;
        Ok(removed)
    }
}
