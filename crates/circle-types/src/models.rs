use serde::{Deserialize, Serialize};

use crate::{RecordId, TimeStamp};

/// Account record as stored. Never sent to clients as-is: use [`UserInfo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub updated: TimeStamp,
    /// Unique login name.
    pub username: String,
    /// Display name.
    pub nickname: String,
    /// Argon2 PHC string. Changing it does not bump `updated`.
    pub password_hash: String,
}

/// Public projection of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: RecordId,
    pub updated: TimeStamp,
    pub username: String,
    pub nickname: String,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            updated: user.updated,
            username: user.username.clone(),
            nickname: user.nickname.clone(),
        }
    }
}

/// Session credential. At most one per user; the store key is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub user_id: RecordId,
    /// Hex SHA-256 of the secret handed to the client.
    pub digest: String,
    /// Absolute expiry.
    pub expires: TimeStamp,
}

/// One side of a friend pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub user_id: RecordId,
    pub chat_id: Option<RecordId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendList {
    /// Same as the owning user's id.
    pub id: RecordId,
    pub updated: TimeStamp,
    pub list: Vec<Friend>,
}

impl FriendList {
    /// Linear scan, O(list length).
    pub fn get(&self, friend_id: &str) -> Option<&Friend> {
        self.list.iter().find(|f| f.user_id == friend_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: RecordId,
    pub updated: TimeStamp,
    pub user_ids: Vec<RecordId>,
    pub post_ids: Vec<RecordId>,
}

impl Chat {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.user_ids.iter().any(|id| id == user_id)
    }

    pub fn other_members(&self, user_id: &str) -> Vec<RecordId> {
        self.user_ids.iter().filter(|id| *id != user_id).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPost {
    pub id: RecordId,
    pub updated: TimeStamp,
    pub created: TimeStamp,
    pub user_id: RecordId,
    pub chat_id: RecordId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    /// Same as the owning user's id.
    pub id: RecordId,
    pub updated: TimeStamp,
    pub user_id: RecordId,
    pub post_ids: Vec<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: RecordId,
    pub updated: TimeStamp,
    pub created: TimeStamp,
    pub blog_id: RecordId,
    pub user_id: RecordId,
    pub content: String,
}

/// Metadata returned after a blog write; the client already has the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPostInfo {
    pub id: RecordId,
    pub updated: TimeStamp,
    pub created: TimeStamp,
    pub blog_id: RecordId,
    pub user_id: RecordId,
}

impl From<&BlogPost> for BlogPostInfo {
    fn from(post: &BlogPost) -> Self {
        Self {
            id: post.id.clone(),
            updated: post.updated,
            created: post.created,
            blog_id: post.blog_id.clone(),
            user_id: post.user_id.clone(),
        }
    }
}

/// Unacknowledged events for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifList {
    /// Same as the owning user's id.
    pub id: RecordId,
    pub updated: TimeStamp,
    pub friends_added: Vec<RecordId>,
    pub friends_removed: Vec<RecordId>,
    pub chat_activity: Vec<RecordId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifCategory {
    FriendsAdded,
    FriendsRemoved,
    ChatActivity,
}

impl NotifCategory {
    pub const ALL: [NotifCategory; 3] = [
        NotifCategory::FriendsAdded,
        NotifCategory::FriendsRemoved,
        NotifCategory::ChatActivity,
    ];

    /// Name of the set inside [`NotifList`].
    pub fn field(self) -> &'static str {
        match self {
            Self::FriendsAdded => "friends_added",
            Self::FriendsRemoved => "friends_removed",
            Self::ChatActivity => "chat_activity",
        }
    }
}

impl NotifList {
    pub fn empty(user_id: &str, updated: TimeStamp) -> Self {
        Self {
            id: user_id.to_string(),
            updated,
            ..Default::default()
        }
    }

    pub fn set(&self, category: NotifCategory) -> &[RecordId] {
        match category {
            NotifCategory::FriendsAdded => &self.friends_added,
            NotifCategory::FriendsRemoved => &self.friends_removed,
            NotifCategory::ChatActivity => &self.chat_activity,
        }
    }

    pub fn set_mut(&mut self, category: NotifCategory) -> &mut Vec<RecordId> {
        match category {
            NotifCategory::FriendsAdded => &mut self.friends_added,
            NotifCategory::FriendsRemoved => &mut self.friends_removed,
            NotifCategory::ChatActivity => &mut self.chat_activity,
        }
    }
}
