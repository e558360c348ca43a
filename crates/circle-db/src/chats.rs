use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use circle_types::models::{Chat, ChatPost};
use circle_types::{RecordId, now_millis};

use crate::adapter::Kind;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::validate;

impl Store {
    /// New empty chat between two users. Only the friend-graph engine should
    /// call this: a chat must always be referenced by a friend pair.
    pub(crate) fn create_chat(&self, a: &str, b: &str) -> Result<Chat> {
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            updated: now_millis(),
            user_ids: vec![a.to_string(), b.to_string()],
            post_ids: Vec::new(),
        };
        self.create(Kind::Chat, &chat.id, &chat)?;
        debug!("Created chat {} for {} and {}", chat.id, a, b);
        Ok(chat)
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>> {
        self.load(Kind::Chat, chat_id)
    }

    /// Delete a chat and all of its posts. Returns `false` if it was already gone.
    pub(crate) fn delete_chat(&self, chat_id: &str) -> Result<bool> {
        let Some(chat) = self.get_chat(chat_id)? else {
            return Ok(false);
        };
        self.documents().delete_many(Kind::ChatPost, &chat.post_ids)?;
        let deleted = self.documents().delete(Kind::Chat, chat_id)?;
        debug!("Deleted chat {} ({} posts)", chat_id, chat.post_ids.len());
        Ok(deleted)
    }

    pub fn is_chat_member(&self, chat_id: &str, user_id: &str) -> Result<bool> {
        Ok(self
            .get_chat(chat_id)?
            .is_some_and(|chat| chat.is_member(user_id)))
    }

    /// Append a post to a chat the author belongs to.
    pub fn insert_chat_post(&self, user_id: &str, chat_id: &str, content: &str) -> Result<ChatPost> {
        validate::content(content)?;
        let chat = self
            .get_chat(chat_id)?
            .ok_or(Error::NotFound("chat"))?;
        if !chat.is_member(user_id) {
            return Err(Error::unauthorized("not a member of this chat"));
        }

        let now = now_millis();
        let post = ChatPost {
            id: Uuid::new_v4().to_string(),
            updated: now,
            created: now,
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
        };
        self.create(Kind::ChatPost, &post.id, &post)?;

        if !self
            .documents()
            .list_append(Kind::Chat, chat_id, "post_ids", Value::from(post.id.clone()))?
        {
            // The chat vanished between the membership check and the append.
            warn!("Chat {} disappeared while posting; dropping post {}", chat_id, post.id);
            self.documents().delete(Kind::ChatPost, &post.id)?;
            return Err(Error::NotFound("chat"));
        }

        Ok(post)
    }

    /// Posts among `ids` that belong to chats the user is a member of.
    pub fn chat_posts_for_user(&self, user_id: &str, ids: &[RecordId]) -> Result<Vec<ChatPost>> {
        let posts: Vec<ChatPost> = self.load_many(Kind::ChatPost, ids)?;
        let mut membership: HashMap<RecordId, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(posts.len());

        for post in posts {
            let member = match membership.get(&post.chat_id) {
                Some(member) => *member,
                None => {
                    let member = self.is_chat_member(&post.chat_id, user_id)?;
                    membership.insert(post.chat_id.clone(), member);
                    member
                }
            };
            if member {
                visible.push(post);
            }
        }
        Ok(visible)
    }
}
