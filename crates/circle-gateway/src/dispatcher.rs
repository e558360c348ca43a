use serde::Serialize;
use tracing::{debug, error, info, warn};

use circle_db::{Error, Result, Store};
use circle_types::RecordId;
use circle_types::events::{ChatEvent, CloseCode, UserEvent};
use circle_types::models::{ChatPost, Friend, NotifCategory};

use crate::blocking;
use crate::registry::SessionRegistry;

/// How an event reached one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to a live session.
    Pushed,
    /// Recorded in the target's notification list.
    Queued,
    /// The target no longer exists.
    Dropped,
}

/// Applies friend and chat mutations and fans the result out to the other
/// party: a live push if they are connected, a notification otherwise.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    registry: SessionRegistry,
}

impl Dispatcher {
    pub fn new(store: Store, registry: SessionRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    // -- Operations --

    pub async fn add_friend(&self, user_id: &str, friend_id: &str) -> Result<Friend> {
        let this = self.clone();
        let (user_id, friend_id) = (user_id.to_string(), friend_id.to_string());
        blocking(move || {
            let friend = this.store.insert_pair(&user_id, &friend_id)?;
            let theirs = Friend {
                user_id: user_id.clone(),
                chat_id: friend.chat_id.clone(),
            };
            if let Err(e) = this.friend_added(&friend_id, theirs) {
                error!("Fan-out of friend add {} -> {} failed: {}", user_id, friend_id, e);
            }
            Ok(friend)
        })
        .await
    }

    pub async fn remove_friend(&self, user_id: &str, friend_id: &str) -> Result<()> {
        let this = self.clone();
        let (user_id, friend_id) = (user_id.to_string(), friend_id.to_string());
        blocking(move || {
            let chat_id = this.store.get_pair(&user_id, &friend_id)?.and_then(|f| f.chat_id);
            this.store.remove_pair(&user_id, &friend_id)?;
            if let Some(chat_id) = chat_id {
                this.chat_deleted(&chat_id);
            }
            if let Err(e) = this.friend_removed(&friend_id, &user_id) {
                error!("Fan-out of friend removal {} -> {} failed: {}", user_id, friend_id, e);
            }
            Ok(())
        })
        .await
    }

    pub async fn add_chat_post(&self, user_id: &str, chat_id: &str, content: &str) -> Result<ChatPost> {
        let this = self.clone();
        let (user_id, chat_id, content) = (user_id.to_string(), chat_id.to_string(), content.to_string());
        blocking(move || {
            let post = this.store.insert_chat_post(&user_id, &chat_id, &content)?;
            if let Err(e) = this.chat_post_added(&post) {
                error!("Fan-out of post {} in chat {} failed: {}", post.id, chat_id, e);
            }
            Ok(post)
        })
        .await
    }

    // -- Fan-out --
    //
    // These touch the store and must run on a blocking thread.

    /// Tell `target` that `friend.user_id` added them.
    pub fn friend_added(&self, target: &str, friend: Friend) -> Result<Delivery> {
        let friend_id = friend.user_id.clone();
        if self.push_user(target, &UserEvent::FriendAddNotif { friend }) {
            return Ok(Delivery::Pushed);
        }
        self.queue(target, NotifCategory::FriendsAdded, &friend_id)
    }

    /// Tell `target` that `friend_id` removed them.
    pub fn friend_removed(&self, target: &str, friend_id: &str) -> Result<Delivery> {
        let event = UserEvent::FriendRemNotif {
            friend_id: friend_id.to_string(),
        };
        if self.push_user(target, &event) {
            return Ok(Delivery::Pushed);
        }
        self.queue(target, NotifCategory::FriendsRemoved, friend_id)
    }

    /// Deliver a new post to every other member of its chat: into their open
    /// chat view, else as an activity ping on their user channel, else into
    /// their notification list.
    pub fn chat_post_added(&self, post: &ChatPost) -> Result<Vec<(RecordId, Delivery)>> {
        let Some(chat) = self.store.get_chat(&post.chat_id)? else {
            warn!("Chat {} gone before post {} could fan out", post.chat_id, post.id);
            return Ok(Vec::new());
        };

        let mut deliveries = Vec::new();
        for target in chat.other_members(&post.user_id) {
            let in_chat = self
                .registry
                .chats()
                .get(&chat.id, &target)
                .is_some_and(|h| h.push(&ChatEvent::ChatAddPostEvent { post: post.clone() }));

            let delivery = if in_chat {
                Delivery::Pushed
            } else if self.push_user(
                &target,
                &UserEvent::ChatActivityNotif {
                    chat_id: chat.id.clone(),
                },
            ) {
                Delivery::Pushed
            } else {
                self.queue(&target, NotifCategory::ChatActivity, &chat.id)?
            };
            debug!("Post {} -> {}: {:?}", post.id, target, delivery);
            deliveries.push((target, delivery));
        }
        Ok(deliveries)
    }

    /// Close every chat-channel session bound to a chat that no longer exists.
    pub fn chat_deleted(&self, chat_id: &str) -> usize {
        let members = self.registry.chats().members(chat_id);
        for handle in &members {
            handle.close(CloseCode::Unauthorized);
        }
        if !members.is_empty() {
            debug!("Closed {} session(s) of deleted chat {}", members.len(), chat_id);
        }
        members.len()
    }

    /// Drop everything live for a deleted account: its user channel and the
    /// chat views of `chat_ids`, which went with it.
    pub fn account_deleted(&self, user_id: &str, chat_ids: &[RecordId]) {
        if let Some(handle) = self.registry.users().get(user_id) {
            handle.close(CloseCode::InvalidToken);
            info!("Closed user channel of deleted account {}", user_id);
        }
        for chat_id in chat_ids {
            self.chat_deleted(chat_id);
        }
    }

    fn push_user<E: Serialize>(&self, target: &str, event: &E) -> bool {
        self.registry
            .users()
            .get(target)
            .is_some_and(|handle| handle.push(event))
    }

    fn queue(&self, target: &str, category: NotifCategory, id: &str) -> Result<Delivery> {
        match self.store.record_notif(target, category, id) {
            Ok(_) => Ok(Delivery::Queued),
            Err(Error::NotFound(_)) => {
                warn!("Dropping {:?} notif for vanished user {}", category, target);
                Ok(Delivery::Dropped)
            }
            Err(e) => Err(e),
        }
    }
}
