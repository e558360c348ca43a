use tracing::trace;

use circle_types::api::NotifClear;
use circle_types::RecordId;
use circle_types::models::{NotifCategory, NotifList};

use crate::adapter::Kind;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::sync::Timestamped;

fn ids_to_clear(clear: &NotifClear, category: NotifCategory) -> Option<&[RecordId]> {
    match category {
        NotifCategory::FriendsAdded => clear.friends_added.as_deref(),
        NotifCategory::FriendsRemoved => clear.friends_removed.as_deref(),
        NotifCategory::ChatActivity => clear.chat_activity.as_deref(),
    }
}

impl Store {
    pub fn read_notifs(&self, user_id: &str) -> Result<NotifList> {
        self.require(Kind::NotifList, user_id, "notification list")
    }

    /// Add `id` to one of the user's notification sets. Returns `false` if
    /// it was already there, in which case nothing is written.
    pub fn record_notif(&self, user_id: &str, category: NotifCategory, id: &str) -> Result<bool> {
        let mut added = false;
        let list = self.update(Kind::NotifList, user_id, |notifs: &mut NotifList| {
            let set = notifs.set_mut(category);
            if set.iter().any(|existing| existing == id) {
                return false;
            }
            set.push(id.to_string());
            notifs.touch();
            added = true;
            true
        })?;
        if list.is_none() {
            return Err(Error::NotFound("notification list"));
        }
        trace!("Notif {:?} {} for {} (new: {})", category, id, user_id, added);
        Ok(added)
    }

    /// Acknowledge ids per category. Categories absent from `clear` are left
    /// alone.
    pub fn clear_notifs(&self, user_id: &str, clear: &NotifClear) -> Result<NotifList> {
        if NotifCategory::ALL.iter().all(|c| ids_to_clear(clear, *c).is_none()) {
            return self.read_notifs(user_id);
        }

        let list = self.update(Kind::NotifList, user_id, |notifs: &mut NotifList| {
            let mut changed = false;
            for category in NotifCategory::ALL {
                let Some(ids) = ids_to_clear(clear, category) else {
                    continue;
                };
                let set = notifs.set_mut(category);
                let before = set.len();
                set.retain(|id| !ids.contains(id));
                changed |= set.len() != before;
            }
            if changed {
                notifs.touch();
            }
            changed
        })?;
        list.ok_or(Error::NotFound("notification list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_user() -> (Store, String) {
        let store = Store::in_memory();
        let user = store.create_user("alice", "Alice", "h").unwrap();
        (store, user.id)
    }

    #[test]
    fn record_is_idempotent() {
        let (store, user) = store_with_user();
        assert!(store.record_notif(&user, NotifCategory::FriendsAdded, "b").unwrap());
        let first = store.read_notifs(&user).unwrap();

        assert!(!store.record_notif(&user, NotifCategory::FriendsAdded, "b").unwrap());
        let second = store.read_notifs(&user).unwrap();
        assert_eq!(second.friends_added, ["b"]);
        assert_eq!(second.updated, first.updated);
    }

    #[test]
    fn categories_are_independent() {
        let (store, user) = store_with_user();
        store.record_notif(&user, NotifCategory::FriendsAdded, "x").unwrap();
        store.record_notif(&user, NotifCategory::ChatActivity, "x").unwrap();

        let clear = NotifClear {
            chat_activity: Some(vec!["x".into()]),
            ..Default::default()
        };
        let after = store.clear_notifs(&user, &clear).unwrap();
        assert_eq!(after.friends_added, ["x"]);
        assert!(after.chat_activity.is_empty());
    }

    #[test]
    fn empty_clear_is_a_no_op() {
        let (store, user) = store_with_user();
        store.record_notif(&user, NotifCategory::FriendsRemoved, "y").unwrap();
        let before = store.read_notifs(&user).unwrap();

        let after = store.clear_notifs(&user, &NotifClear::default()).unwrap();
        assert_eq!(after.updated, before.updated);

        let unknown = NotifClear {
            friends_removed: Some(vec!["nope".into()]),
            ..Default::default()
        };
        let after = store.clear_notifs(&user, &unknown).unwrap();
        assert_eq!(after.updated, before.updated);
        assert_eq!(after.friends_removed, ["y"]);
    }

    #[test]
    fn missing_user_is_not_found() {
        let store = Store::in_memory();
        let err = store.record_notif("ghost", NotifCategory::ChatActivity, "c").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
