//! Per-connection protocol state. A session starts unauthenticated, binds to
//! a user (and, on the chat channel, a chat) with a login message, and from
//! then on re-checks the token on every message.

use tracing::{debug, error, info, warn};

use circle_db::{Error, Store};
use circle_types::RecordId;
use circle_types::events::{ChatCommand, ChatEvent, CloseCode, ReqId, UserCommand, UserEvent};

use crate::blocking;
use crate::dispatcher::Dispatcher;
use crate::registry::SessionHandle;

/// What the socket loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Close(CloseCode),
}

struct Login {
    user_id: RecordId,
    token: String,
}

async fn token_is_valid(store: &Store, user_id: &str, token: &str) -> circle_db::Result<bool> {
    let store = store.clone();
    let (user_id, token) = (user_id.to_string(), token.to_string());
    blocking(move || store.validate_token(&user_id, &token)).await
}

/// Token re-check for an authenticated session.
async fn recheck(store: &Store, login: &Option<Login>) -> Result<RecordId, Step> {
    let Some(login) = login else {
        return Err(Step::Close(CloseCode::Unauthorized));
    };
    match token_is_valid(store, &login.user_id, &login.token).await {
        Ok(true) => Ok(login.user_id.clone()),
        Ok(false) => {
            info!("Token for {} no longer valid, closing", login.user_id);
            Err(Step::Close(CloseCode::InvalidToken))
        }
        Err(e) => {
            error!("Token check for {} failed: {}", login.user_id, e);
            Err(Step::Close(CloseCode::ServerError))
        }
    }
}

/// Outcome of an operation: the success event, a failure message for the
/// client, or a fatal close.
fn respond<T>(result: circle_db::Result<T>, context: &str) -> Result<T, Result<String, Step>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_recoverable() => {
            debug!("{} rejected: {}", context, e);
            Err(Ok(e.to_string()))
        }
        Err(e) => {
            error!("{} failed: {}", context, e);
            Err(Err(Step::Close(CloseCode::ServerError)))
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, Step> {
    serde_json::from_str(text).map_err(|e| {
        let raw: String = text.chars().take(200).collect();
        warn!("Bad message: {} -- raw: {}", e, raw);
        Step::Close(CloseCode::FailedToParseMessage)
    })
}

// -- User channel --

pub struct UserSession {
    dispatcher: Dispatcher,
    handle: SessionHandle,
    login: Option<Login>,
}

impl UserSession {
    pub fn new(dispatcher: Dispatcher, handle: SessionHandle) -> Self {
        Self {
            dispatcher,
            handle,
            login: None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.login.as_ref().map(|l| l.user_id.as_str())
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn handle_text(&mut self, text: &str) -> Step {
        let command: UserCommand = match parse(text) {
            Ok(command) => command,
            Err(step) => return step,
        };

        match command {
            UserCommand::UserLogin {
                req_id,
                user_id,
                token_hash,
            } => self.login(req_id, user_id, token_hash).await,

            UserCommand::FriendAdd { req_id, friend_id } => {
                let user_id = match recheck(self.dispatcher.store(), &self.login).await {
                    Ok(id) => id,
                    Err(step) => return step,
                };
                let event = match respond(
                    self.dispatcher.add_friend(&user_id, &friend_id).await,
                    "friend_add",
                ) {
                    Ok(friend) => UserEvent::FriendAddResponse {
                        req_id,
                        success: true,
                        message: None,
                        friend: Some(friend),
                    },
                    Err(Ok(message)) => UserEvent::FriendAddResponse {
                        req_id,
                        success: false,
                        message: Some(message),
                        friend: None,
                    },
                    Err(Err(step)) => return step,
                };
                self.reply(&event)
            }

            UserCommand::FriendRem { req_id, friend_id } => {
                let user_id = match recheck(self.dispatcher.store(), &self.login).await {
                    Ok(id) => id,
                    Err(step) => return step,
                };
                let event = match respond(
                    self.dispatcher.remove_friend(&user_id, &friend_id).await,
                    "friend_rem",
                ) {
                    Ok(()) => UserEvent::FriendRemResponse {
                        req_id,
                        success: true,
                        message: None,
                        friend_id: Some(friend_id),
                    },
                    Err(Ok(message)) => UserEvent::FriendRemResponse {
                        req_id,
                        success: false,
                        message: Some(message),
                        friend_id: None,
                    },
                    Err(Err(step)) => return step,
                };
                self.reply(&event)
            }
        }
    }

    async fn login(&mut self, req_id: ReqId, user_id: RecordId, token: String) -> Step {
        if self.login.is_some() {
            return self.reply(&UserEvent::login_failed(req_id, CloseCode::AlreadyLoggedIn.reason()));
        }
        match token_is_valid(self.dispatcher.store(), &user_id, &token).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("User login for {} with invalid token", user_id);
                return self.reply(&UserEvent::login_failed(req_id, CloseCode::InvalidToken.reason()));
            }
            Err(e) => {
                error!("User login for {} failed: {}", user_id, e);
                return Step::Close(CloseCode::ServerError);
            }
        }

        if let Err(e) = self.dispatcher.registry().users().add(&user_id, self.handle.clone()) {
            warn!("User {} rejected: {}", user_id, e);
            return self.reply(&UserEvent::login_failed(req_id, e.to_string()));
        }

        info!("User {} logged in on {}", user_id, self.handle.conn_id());
        self.login = Some(Login { user_id, token });
        self.reply(&UserEvent::login_ok(req_id))
    }

    fn reply(&self, event: &UserEvent) -> Step {
        if self.handle.push(event) {
            Step::Continue
        } else {
            Step::Close(CloseCode::ServerError)
        }
    }

    /// Drop this connection's registration, if it still owns one.
    pub fn disconnect(&mut self) {
        if let Some(login) = self.login.take() {
            self.dispatcher
                .registry()
                .users()
                .remove(&login.user_id, self.handle.conn_id());
            info!("User {} disconnected", login.user_id);
        }
    }
}

// -- Chat channel --

pub struct ChatSession {
    dispatcher: Dispatcher,
    handle: SessionHandle,
    login: Option<Login>,
    chat_id: Option<RecordId>,
}

impl ChatSession {
    pub fn new(dispatcher: Dispatcher, handle: SessionHandle) -> Self {
        Self {
            dispatcher,
            handle,
            login: None,
            chat_id: None,
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn handle_text(&mut self, text: &str) -> Step {
        let command: ChatCommand = match parse(text) {
            Ok(command) => command,
            Err(step) => return step,
        };

        match command {
            ChatCommand::ChatLogin {
                req_id,
                user_id,
                token_hash,
                chat_id,
            } => self.login(req_id, user_id, token_hash, chat_id).await,

            ChatCommand::ChatAddPost { req_id, content } => {
                let user_id = match recheck(self.dispatcher.store(), &self.login).await {
                    Ok(id) => id,
                    Err(step) => return step,
                };
                let Some(chat_id) = self.chat_id.clone() else {
                    return Step::Close(CloseCode::Unauthorized);
                };
                let event = match respond(
                    self.dispatcher.add_chat_post(&user_id, &chat_id, &content).await,
                    "chat_add_post",
                ) {
                    Ok(post) => ChatEvent::ChatAddPostResponse {
                        req_id,
                        success: true,
                        message: None,
                        post: Some(post),
                    },
                    Err(Ok(message)) => ChatEvent::ChatAddPostResponse {
                        req_id,
                        success: false,
                        message: Some(message),
                        post: None,
                    },
                    Err(Err(step)) => return step,
                };
                self.reply(&event)
            }
        }
    }

    async fn login(&mut self, req_id: ReqId, user_id: RecordId, token: String, chat_id: RecordId) -> Step {
        if self.login.is_some() {
            return self.reply(&ChatEvent::login_failed(req_id, CloseCode::AlreadyLoggedIn.reason()));
        }

        let store = self.dispatcher.store().clone();
        let check = {
            let (user_id, token, chat_id) = (user_id.clone(), token.clone(), chat_id.clone());
            blocking(move || {
                if !store.validate_token(&user_id, &token)? {
                    return Err(Error::unauthorized(CloseCode::InvalidToken.reason()));
                }
                if !store.is_chat_member(&chat_id, &user_id)? {
                    return Err(Error::unauthorized("not a member of this chat"));
                }
                Ok(())
            })
            .await
        };
        match check {
            Ok(()) => {}
            Err(Error::Unauthorized(message)) => {
                warn!("Chat login for {} in {} refused: {}", user_id, chat_id, message);
                return self.reply(&ChatEvent::login_failed(req_id, message));
            }
            Err(e) => {
                error!("Chat login for {} failed: {}", user_id, e);
                return Step::Close(CloseCode::ServerError);
            }
        }

        if let Err(e) = self
            .dispatcher
            .registry()
            .chats()
            .add(&chat_id, &user_id, self.handle.clone())
        {
            warn!("Chat session {} / {} rejected: {}", chat_id, user_id, e);
            return self.reply(&ChatEvent::login_failed(req_id, e.to_string()));
        }

        info!("User {} joined chat {} on {}", user_id, chat_id, self.handle.conn_id());
        self.login = Some(Login { user_id, token });
        self.chat_id = Some(chat_id);
        self.reply(&ChatEvent::login_ok(req_id))
    }

    fn reply(&self, event: &ChatEvent) -> Step {
        if self.handle.push(event) {
            Step::Continue
        } else {
            Step::Close(CloseCode::ServerError)
        }
    }

    pub fn disconnect(&mut self) {
        if let (Some(login), Some(chat_id)) = (self.login.take(), self.chat_id.take()) {
            self.dispatcher
                .registry()
                .chats()
                .remove(&chat_id, &login.user_id, self.handle.conn_id());
            info!("User {} left chat {}", login.user_id, chat_id);
        }
    }
}
