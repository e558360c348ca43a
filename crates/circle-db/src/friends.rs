//! Friend graph. Every pair is stored twice, once in each user's list, with
//! the same chat id on both sides. Writes go A first, then B; a failure
//! between the two is surfaced as [`Error::Consistency`] and the next attempt
//! at the same operation finishes the job.
//!
//! Writes to one pair are serialized inside the process by [`PairLocks`].
//! List appends are also idempotent, so a writer that slips past the lock
//! (another process on the same database) cannot duplicate an entry.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use tracing::{error, info, warn};

use circle_types::RecordId;
use circle_types::models::{Friend, FriendList, User};

use crate::adapter::{Kind, ListMatch};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::sync::Timestamped;

const PAIR_LOCK_STRIPES: usize = 64;

/// Striped locks keyed by the unordered pair `{a, b}`.
pub(crate) struct PairLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for PairLocks {
    fn default() -> Self {
        Self {
            stripes: (0..PAIR_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }
}

impl PairLocks {
    /// Hold this while touching either side of `{a, b}`. Never take two at once.
    pub(crate) fn lock(&self, a: &str, b: &str) -> MutexGuard<'_, ()> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = DefaultHasher::new();
        lo.hash(&mut hasher);
        hi.hash(&mut hasher);
        let stripe = (hasher.finish() % self.stripes.len() as u64) as usize;
        // The guarded value is `()`: a panicking holder leaves nothing to repair.
        self.stripes[stripe].lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn half_applied(op: &str, a: &str, b: &str, cause: Error) -> Error {
    error!("{} {} <-> {} half-applied: {}", op, a, b, cause);
    Error::Consistency(format!("{op} was only partially applied, retry it: {cause}"))
}

impl Store {
    pub fn friend_list(&self, user_id: &str) -> Result<FriendList> {
        self.require(Kind::FriendList, user_id, "friend list")
    }

    /// `b`'s entry in `a`'s list. Linear in the length of the list.
    pub fn get_pair(&self, a: &str, b: &str) -> Result<Option<Friend>> {
        Ok(self
            .load::<FriendList>(Kind::FriendList, a)?
            .and_then(|list| list.get(b).cloned()))
    }

    pub fn has_pair(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.get_pair(a, b)?.is_some())
    }

    /// Make `a` and `b` friends and give them a chat. Returns `a`'s new entry.
    pub fn insert_pair(&self, a: &str, b: &str) -> Result<Friend> {
        if a == b {
            return Err(Error::validation("cannot befriend yourself"));
        }
        let _pair = self.pair_locks().lock(a, b);
        let _: User = self.require(Kind::User, a, "user")?;
        let _: User = self.require(Kind::User, b, "friend")?;

        let chat_id = match (self.get_pair(a, b)?, self.get_pair(b, a)?) {
            (Some(_), Some(_)) => return Err(Error::conflict("already friends")),
            (None, None) => {
                let chat = self.create_chat(a, b)?;
                let entry = match self.append_friend(a, b, Some(chat.id.clone())) {
                    Ok(entry) => entry,
                    Err(e) => {
                        // Nothing references the chat yet.
                        self.delete_chat(&chat.id)?;
                        return Err(e);
                    }
                };
                let chat_id = match entry.chat_id {
                    Some(existing) if existing != chat.id => {
                        warn!("{} already listed {}, dropping chat {}", a, b, chat.id);
                        self.delete_chat(&chat.id)?;
                        existing
                    }
                    Some(_) => chat.id,
                    None => {
                        self.set_friend_chat(a, b, &chat.id)?;
                        chat.id
                    }
                };
                self.mirror_friend(a, b, &chat_id)?;
                chat_id
            }
            (Some(dangling), None) => {
                warn!("Completing one-sided friend pair {} -> {}", a, b);
                let chat_id = self.reconcile_chat(a, &dangling, b)?;
                self.mirror_friend(a, b, &chat_id)?;
                chat_id
            }
            (None, Some(dangling)) => {
                warn!("Completing one-sided friend pair {} -> {}", b, a);
                let chat_id = self.reconcile_chat(b, &dangling, a)?;
                self.mirror_friend(b, a, &chat_id)?;
                chat_id
            }
        };

        info!("{} and {} are now friends", a, b);
        Ok(Friend {
            user_id: b.to_string(),
            chat_id: Some(chat_id),
        })
    }

    /// Unfriend `a` and `b`. The shared chat and its posts go first, then
    /// both list entries.
    pub fn remove_pair(&self, a: &str, b: &str) -> Result<()> {
        if a == b {
            return Err(Error::validation("cannot unfriend yourself"));
        }
        let _pair = self.pair_locks().lock(a, b);
        let side_a = self.get_pair(a, b)?;
        let side_b = self.get_pair(b, a)?;
        if side_a.is_none() && side_b.is_none() {
            return Err(Error::NotFound("friend"));
        }

        let mut chats: Vec<&RecordId> = Vec::new();
        for chat_id in [&side_a, &side_b].into_iter().flatten().filter_map(|f| f.chat_id.as_ref()) {
            if !chats.contains(&chat_id) {
                chats.push(chat_id);
            }
        }
        for chat_id in chats {
            self.delete_chat(chat_id)?;
        }

        self.pull_friend(a, b)
            .map_err(|e| half_applied("remove_pair", a, b, e))?;
        self.pull_friend(b, a)
            .map_err(|e| half_applied("remove_pair", a, b, e))?;

        info!("{} and {} are no longer friends", a, b);
        Ok(())
    }

    /// Add `friend_id` to `owner`'s list unless it is already there. Returns
    /// the entry as stored, which keeps its own chat if it existed.
    fn append_friend(&self, owner: &str, friend_id: &str, chat_id: Option<RecordId>) -> Result<Friend> {
        let mut stored: Option<Friend> = None;
        let list = self.update(Kind::FriendList, owner, |list: &mut FriendList| {
            if let Some(existing) = list.get(friend_id) {
                stored = Some(existing.clone());
                return false;
            }
            let entry = Friend {
                user_id: friend_id.to_string(),
                chat_id: chat_id.clone(),
            };
            list.list.push(entry.clone());
            list.touch();
            stored = Some(entry);
            true
        })?;
        match (list, stored) {
            (Some(_), Some(entry)) => Ok(entry),
            _ => Err(Error::NotFound("friend list")),
        }
    }

    /// Give `friend_id` the entry matching `owner`'s, on `chat_id`. If the
    /// other side already holds an entry on a different chat, that chat is
    /// dropped in favour of `chat_id`.
    fn mirror_friend(&self, owner: &str, friend_id: &str, chat_id: &RecordId) -> Result<()> {
        let theirs = self
            .append_friend(friend_id, owner, Some(chat_id.clone()))
            .map_err(|e| half_applied("insert_pair", owner, friend_id, e))?;
        if theirs.chat_id.as_ref() == Some(chat_id) {
            return Ok(());
        }

        warn!("Friend pair {} <-> {} had diverging chats, keeping {}", owner, friend_id, chat_id);
        self.set_friend_chat(friend_id, owner, chat_id)
            .map_err(|e| half_applied("insert_pair", owner, friend_id, e))?;
        if let Some(stale) = &theirs.chat_id {
            self.delete_chat(stale)?;
        }
        Ok(())
    }

    fn pull_friend(&self, owner: &str, friend_id: &str) -> Result<usize> {
        Ok(self.documents().list_remove(
            Kind::FriendList,
            owner,
            "list",
            &ListMatch::field("user_id", friend_id),
        )?)
    }

    /// Chat to use when finishing a one-sided pair: the dangling entry's own
    /// chat if it still exists, otherwise a new one written back into the
    /// dangling entry.
    fn reconcile_chat(&self, owner: &str, dangling: &Friend, other: &str) -> Result<RecordId> {
        if let Some(chat_id) = &dangling.chat_id {
            if let Some(chat) = self.get_chat(chat_id)? {
                if chat.is_member(owner) && chat.is_member(other) {
                    return Ok(chat.id);
                }
            }
        }

        let chat = self.create_chat(owner, other)?;
        self.set_friend_chat(owner, other, &chat.id)?;
        Ok(chat.id)
    }

    fn set_friend_chat(&self, owner: &str, friend_id: &str, chat_id: &str) -> Result<()> {
        let updated = self.update(Kind::FriendList, owner, |list: &mut FriendList| {
            let Some(entry) = list.list.iter_mut().find(|f| f.user_id == friend_id) else {
                return false;
            };
            if entry.chat_id.as_deref() == Some(chat_id) {
                return false;
            }
            entry.chat_id = Some(chat_id.to_string());
            list.touch();
            true
        })?;
        match updated {
            Some(list) if list.get(friend_id).is_some() => Ok(()),
            _ => Err(Error::NotFound("friend")),
        }
    }
}
