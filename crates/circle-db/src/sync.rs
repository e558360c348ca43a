//! Timestamp-diff sync: a document is sent back only when the client's cached
//! `updated` differs from the server's.

use serde::de::DeserializeOwned;

use circle_types::models::{Blog, Chat, FriendList, NotifList, User, UserInfo};
use circle_types::{RecordId, TimeStamp, next_timestamp};

use crate::adapter::Kind;
use crate::error::{Error, Result};
use crate::store::Store;

/// Aggregates carrying an `updated` field.
pub trait Timestamped {
    fn updated(&self) -> TimeStamp;
    fn set_updated(&mut self, ts: TimeStamp);

    /// Strictly bump `updated`.
    fn touch(&mut self) {
        self.set_updated(next_timestamp(self.updated()));
    }
}

macro_rules! timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn updated(&self) -> TimeStamp {
                self.updated
            }

            fn set_updated(&mut self, ts: TimeStamp) {
                self.updated = ts;
            }
        })*
    };
}

timestamped!(User, FriendList, Chat, Blog, NotifList);

fn pair_up<'a>(ids: &'a [RecordId], tss: &'a [TimeStamp]) -> Result<impl Iterator<Item = (&'a RecordId, TimeStamp)>> {
    if ids.len() != tss.len() {
        return Err(Error::validation(format!(
            "got {} ids but {} timestamps",
            ids.len(),
            tss.len()
        )));
    }
    Ok(ids.iter().zip(tss.iter().copied()))
}

impl Store {
    fn changed_one<T>(&self, kind: Kind, id: &str, ts: TimeStamp) -> Result<Option<T>>
    where
        T: Timestamped + DeserializeOwned,
    {
        Ok(self.load::<T>(kind, id)?.filter(|doc| doc.updated() != ts))
    }

    fn changed_many<T>(&self, kind: Kind, ids: &[RecordId], tss: &[TimeStamp]) -> Result<Vec<T>>
    where
        T: Timestamped + DeserializeOwned,
    {
        let mut changed = Vec::new();
        for (id, ts) in pair_up(ids, tss)? {
            if let Some(doc) = self.changed_one(kind, id, ts)? {
                changed.push(doc);
            }
        }
        Ok(changed)
    }

    pub fn sync_blogs(&self, ids: &[RecordId], tss: &[TimeStamp]) -> Result<Vec<Blog>> {
        self.changed_many(Kind::Blog, ids, tss)
    }

    /// Like [`Store::sync_blogs`], but chats the user is not a member of are
    /// left out.
    pub fn sync_chats(
        &self,
        user_id: &str,
        ids: &[RecordId],
        tss: &[TimeStamp],
    ) -> Result<Vec<Chat>> {
        let chats: Vec<Chat> = self.changed_many(Kind::Chat, ids, tss)?;
        Ok(chats.into_iter().filter(|c| c.is_member(user_id)).collect())
    }

    pub fn sync_infos(&self, ids: &[RecordId], tss: &[TimeStamp]) -> Result<Vec<UserInfo>> {
        let users: Vec<User> = self.changed_many(Kind::User, ids, tss)?;
        Ok(users.iter().map(UserInfo::from).collect())
    }

    pub fn sync_flist(&self, user_id: &str, ts: TimeStamp) -> Result<Option<FriendList>> {
        self.changed_one(Kind::FriendList, user_id, ts)
    }

    pub fn sync_notifs(&self, user_id: &str, ts: TimeStamp) -> Result<Option<NotifList>> {
        self.changed_one(Kind::NotifList, user_id, ts)
    }
}

#[cfg(test)]
mod tests {
    use circle_types::NONE_TIMESTAMP;

    use super::*;

    fn store_with_users() -> (Store, User, User) {
        let store = Store::in_memory();
        let a = store.create_user("alice", "Alice", "hash").unwrap();
        let b = store.create_user("bobby", "Bob", "hash").unwrap();
        (store, a, b)
    }

    #[test]
    fn unchanged_timestamp_is_a_no_op() {
        let (store, a, _) = store_with_users();
        let flist = store.sync_flist(&a.id, NONE_TIMESTAMP).unwrap().unwrap();
        assert!(store.sync_flist(&a.id, flist.updated).unwrap().is_none());
    }

    #[test]
    fn mutation_makes_old_timestamp_stale() {
        let (store, a, b) = store_with_users();
        let before = store.sync_flist(&a.id, NONE_TIMESTAMP).unwrap().unwrap();

        store.insert_pair(&a.id, &b.id).unwrap();

        let after = store.sync_flist(&a.id, before.updated).unwrap().unwrap();
        assert!(after.updated > before.updated);
        assert_eq!(after.list.len(), 1);
    }

    #[test]
    fn infos_project_users_and_skip_missing() {
        let (store, a, b) = store_with_users();
        let ids = vec![a.id.clone(), "gone".to_string(), b.id.clone()];
        let infos = store.sync_infos(&ids, &[NONE_TIMESTAMP, 0, b.updated]).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].username, "alice");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let (store, a, _) = store_with_users();
        let err = store.sync_blogs(&[a.id.clone()], &[]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn chats_are_filtered_by_membership() {
        let (store, a, b) = store_with_users();
        let c = store.create_user("carol", "Carol", "hash").unwrap();
        let friend = store.insert_pair(&a.id, &b.id).unwrap();
        let chat_id = friend.chat_id.unwrap();

        let ids = vec![chat_id.clone()];
        assert_eq!(store.sync_chats(&a.id, &ids, &[0]).unwrap().len(), 1);
        assert!(store.sync_chats(&c.id, &ids, &[0]).unwrap().is_empty());
    }
}
