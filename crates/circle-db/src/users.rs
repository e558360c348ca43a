use tracing::{debug, info};
use uuid::Uuid;

use circle_types::models::{Blog, FriendList, NotifList, User};
use circle_types::{RecordId, now_millis};

use crate::adapter::{Kind, ListMatch};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::sync::Timestamped;
use crate::validate;

pub const SEARCH_LIMIT: usize = 20;

/// Profile fields to change. `None` leaves the field alone.
#[derive(Debug, Default, Clone)]
pub struct UserPatch {
    pub username: Option<String>,
    pub nickname: Option<String>,
    /// Already hashed.
    pub password_hash: Option<String>,
}

impl UserPatch {
    fn validate(&self) -> Result<()> {
        if let Some(username) = &self.username {
            validate::username(username)?;
        }
        if let Some(nickname) = &self.nickname {
            validate::nickname(nickname)?;
        }
        Ok(())
    }
}

impl Store {
    /// Create a user together with the friend list, blog and notification
    /// list that share its id.
    pub fn create_user(&self, username: &str, nickname: &str, password_hash: &str) -> Result<User> {
        validate::username(username)?;
        validate::nickname(nickname)?;
        if self.user_by_username(username)?.is_some() {
            return Err(Error::conflict("username already taken"));
        }

        let id = Uuid::new_v4().to_string();
        let now = now_millis();
        let user = User {
            id: id.clone(),
            updated: now,
            username: username.to_string(),
            nickname: nickname.to_string(),
            password_hash: password_hash.to_string(),
        };

        self.create(Kind::User, &id, &user)?;
        self.create(
            Kind::FriendList,
            &id,
            &FriendList {
                id: id.clone(),
                updated: now,
                list: Vec::new(),
            },
        )?;
        self.create_blog(&id)?;
        self.create(Kind::NotifList, &id, &NotifList::empty(&id, now))?;

        info!("Created user {} ({})", user.username, id);
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.load(Kind::User, user_id)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.documents().find_by_field(Kind::User, "username", username)? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    /// Ids of up to `limit` users whose username contains `query`, ignoring case.
    pub fn search_users(&self, query: &str, limit: usize) -> Result<Vec<RecordId>> {
        let needle = query.to_lowercase();
        let mut found = Vec::new();
        let mut decode_error = None;

        self.documents().scan(Kind::User, &mut |doc| {
            if found.len() >= limit {
                return false;
            }
            match serde_json::from_value::<User>(doc.clone()) {
                Ok(user) => {
                    if user.username.to_lowercase().contains(&needle) {
                        found.push(user.id);
                    }
                    found.len() < limit
                }
                Err(e) => {
                    decode_error = Some(e);
                    false
                }
            }
        })?;

        if let Some(e) = decode_error {
            return Err(e.into());
        }
        debug!("User search {:?} matched {}", query, found.len());
        Ok(found)
    }

    /// Apply a profile patch. Only username and nickname changes bump
    /// `updated`; a new password hash is stored silently.
    pub fn update_profile(&self, user_id: &str, patch: &UserPatch) -> Result<User> {
        patch.validate()?;

        if let Some(username) = &patch.username {
            if let Some(existing) = self.user_by_username(username)? {
                if existing.id != user_id {
                    return Err(Error::conflict("username already taken"));
                }
            }
        }

        let updated = self.update(Kind::User, user_id, |user: &mut User| {
            let mut visible = false;
            if let Some(username) = &patch.username {
                if user.username != *username {
                    user.username = username.clone();
                    visible = true;
                }
            }
            if let Some(nickname) = &patch.nickname {
                if user.nickname != *nickname {
                    user.nickname = nickname.clone();
                    visible = true;
                }
            }
            let mut changed = visible;
            if let Some(hash) = &patch.password_hash {
                user.password_hash = hash.clone();
                changed = true;
            }
            if visible {
                user.touch();
            }
            changed
        })?;

        updated.ok_or(Error::NotFound("user"))
    }

    /// Remove a user and everything hanging off it. Each friend loses its
    /// entry and the shared chat.
    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        let _user: User = self.require(Kind::User, user_id, "user")?;

        if let Some(flist) = self.load::<FriendList>(Kind::FriendList, user_id)? {
            for friend in &flist.list {
                let _pair = self.pair_locks().lock(user_id, &friend.user_id);
                if let Some(chat_id) = &friend.chat_id {
                    self.delete_chat(chat_id)?;
                }
                self.documents().list_remove(
                    Kind::FriendList,
                    &friend.user_id,
                    "list",
                    &ListMatch::field("user_id", user_id),
                )?;
            }
        }

        self.documents().delete(Kind::FriendList, user_id)?;
        self.delete_blog(user_id)?;
        self.revoke_token(user_id)?;
        self.documents().delete(Kind::NotifList, user_id)?;
        self.documents().delete(Kind::User, user_id)?;

        info!("Deleted user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_sets_up_companion_documents() {
        let store = Store::in_memory();
        let user = store.create_user("alice", "Alice", "hash").unwrap();

        assert!(store.friend_list(&user.id).unwrap().list.is_empty());
        assert!(store.get_blog(&user.id).unwrap().is_some());
        assert!(store.read_notifs(&user.id).unwrap().friends_added.is_empty());
    }

    #[test]
    fn usernames_are_unique() {
        let store = Store::in_memory();
        store.create_user("alice", "Alice", "hash").unwrap();
        let err = store.create_user("alice", "Other", "hash").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let store = Store::in_memory();
        for i in 0..25 {
            store.create_user(&format!("Fan_{i:02}"), "Fan", "hash").unwrap();
        }
        store.create_user("other", "Other", "hash").unwrap();

        assert_eq!(store.search_users("fan", SEARCH_LIMIT).unwrap().len(), SEARCH_LIMIT);
        assert_eq!(store.search_users("OTH", SEARCH_LIMIT).unwrap().len(), 1);
        assert!(store.search_users("nobody", SEARCH_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn password_change_does_not_bump_updated() {
        let store = Store::in_memory();
        let user = store.create_user("alice", "Alice", "old").unwrap();

        let patch = UserPatch {
            password_hash: Some("new".into()),
            ..Default::default()
        };
        let after = store.update_profile(&user.id, &patch).unwrap();
        assert_eq!(after.updated, user.updated);
        assert_eq!(after.password_hash, "new");

        let patch = UserPatch {
            nickname: Some("Ally".into()),
            ..Default::default()
        };
        let after = store.update_profile(&user.id, &patch).unwrap();
        assert!(after.updated > user.updated);
    }

    #[test]
    fn rename_to_taken_username_conflicts() {
        let store = Store::in_memory();
        let a = store.create_user("alice", "Alice", "h").unwrap();
        store.create_user("bobby", "Bob", "h").unwrap();

        let patch = UserPatch {
            username: Some("bobby".into()),
            ..Default::default()
        };
        assert!(matches!(store.update_profile(&a.id, &patch), Err(Error::Conflict(_))));

        let patch = UserPatch {
            username: Some("alice".into()),
            ..Default::default()
        };
        assert!(store.update_profile(&a.id, &patch).is_ok());
    }

    #[test]
    fn delete_user_cascades_to_friends_and_chats() {
        let store = Store::in_memory();
        let a = store.create_user("alice", "Alice", "h").unwrap();
        let b = store.create_user("bobby", "Bob", "h").unwrap();
        let friend = store.insert_pair(&a.id, &b.id).unwrap();
        let chat_id = friend.chat_id.unwrap();
        let post = store.insert_chat_post(&a.id, &chat_id, "hello").unwrap();
        store.issue_token(&a.id).unwrap();

        store.delete_user(&a.id).unwrap();

        assert!(store.get_user(&a.id).unwrap().is_none());
        assert!(store.get_chat(&chat_id).unwrap().is_none());
        assert!(store.chat_posts_for_user(&b.id, &[post.id]).unwrap().is_empty());
        assert!(!store.has_pair(&b.id, &a.id).unwrap());
        assert!(store.get_blog(&a.id).unwrap().is_none());
        assert!(store.documents().get(Kind::Token, &a.id).unwrap().is_none());
        assert!(store.user_by_username("alice").unwrap().is_none());
    }
}
