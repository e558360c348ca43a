use serde::{Deserialize, Serialize};

use crate::RecordId;
use crate::models::{ChatPost, Friend};

/// Client-chosen id correlating a response with its request.
pub type ReqId = u64;

/// Commands sent FROM client TO server on the user channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mtype", rename_all = "snake_case")]
pub enum UserCommand {
    /// Bind this socket to a user. Must be the first message.
    UserLogin {
        req_id: ReqId,
        user_id: RecordId,
        token_hash: String,
    },

    FriendAdd { req_id: ReqId, friend_id: RecordId },

    FriendRem { req_id: ReqId, friend_id: RecordId },
}

/// Events sent FROM server TO client on the user channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mtype", rename_all = "snake_case")]
pub enum UserEvent {
    UserLoginResponse {
        req_id: ReqId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    FriendAddResponse {
        req_id: ReqId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        friend: Option<Friend>,
    },

    /// Someone added this user. Carries the complete new list entry.
    FriendAddNotif { friend: Friend },

    FriendRemResponse {
        req_id: ReqId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        friend_id: Option<RecordId>,
    },

    /// Someone removed this user.
    FriendRemNotif { friend_id: RecordId },

    /// A post landed in a chat this user is not currently viewing.
    ChatActivityNotif { chat_id: RecordId },
}

impl UserEvent {
    pub fn login_ok(req_id: ReqId) -> Self {
        Self::UserLoginResponse {
            req_id,
            success: true,
            message: None,
        }
    }

    pub fn login_failed(req_id: ReqId, message: impl Into<String>) -> Self {
        Self::UserLoginResponse {
            req_id,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Commands sent FROM client TO server on the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mtype", rename_all = "snake_case")]
pub enum ChatCommand {
    /// Bind this socket to a user inside one chat. Must be the first message.
    ChatLogin {
        req_id: ReqId,
        user_id: RecordId,
        token_hash: String,
        chat_id: RecordId,
    },

    ChatAddPost { req_id: ReqId, content: String },
}

/// Events sent FROM server TO client on the chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mtype", rename_all = "snake_case")]
pub enum ChatEvent {
    ChatLoginResponse {
        req_id: ReqId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    ChatAddPostResponse {
        req_id: ReqId,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        post: Option<ChatPost>,
    },

    /// Another member posted to the chat this socket is bound to.
    ChatAddPostEvent { post: ChatPost },
}

impl ChatEvent {
    pub fn login_ok(req_id: ReqId) -> Self {
        Self::ChatLoginResponse {
            req_id,
            success: true,
            message: None,
        }
    }

    pub fn login_failed(req_id: ReqId, message: impl Into<String>) -> Self {
        Self::ChatLoginResponse {
            req_id,
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Application close codes, kept clear of the RFC 6455 protocol range so a
/// client can tell "get a new token" apart from a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    ServerError = 3001,
    WrongDataType = 3002,
    FailedToParseMessage = 3003,
    InvalidToken = 3004,
    Unauthorized = 3005,
    AlreadyLoggedIn = 3006,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            3001 => Some(Self::ServerError),
            3002 => Some(Self::WrongDataType),
            3003 => Some(Self::FailedToParseMessage),
            3004 => Some(Self::InvalidToken),
            3005 => Some(Self::Unauthorized),
            3006 => Some(Self::AlreadyLoggedIn),
            _ => None,
        }
    }

    /// Default close reason sent with the code.
    pub fn reason(self) -> &'static str {
        match self {
            Self::ServerError => "server error",
            Self::WrongDataType => "wrong data type",
            Self::FailedToParseMessage => "failed to parse message",
            Self::InvalidToken => "invalid token",
            Self::Unauthorized => "not logged in",
            Self::AlreadyLoggedIn => "already logged in",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_mtype_tag() {
        let cmd: UserCommand =
            serde_json::from_str(r#"{"mtype":"friend_add","req_id":7,"friend_id":"b"}"#).unwrap();
        assert!(matches!(cmd, UserCommand::FriendAdd { req_id: 7, ref friend_id } if friend_id == "b"));

        let cmd: ChatCommand =
            serde_json::from_str(r#"{"mtype":"chat_add_post","req_id":1,"content":"hi"}"#).unwrap();
        assert!(matches!(cmd, ChatCommand::ChatAddPost { req_id: 1, .. }));
    }

    #[test]
    fn unsolicited_events_have_no_req_id() {
        let json = serde_json::to_value(UserEvent::FriendRemNotif {
            friend_id: "a".into(),
        })
        .unwrap();
        assert_eq!(json["mtype"], "friend_rem_notif");
        assert!(json.get("req_id").is_none());
    }

    #[test]
    fn failed_response_carries_message_only() {
        let json = serde_json::to_value(UserEvent::login_failed(3, "invalid token")).unwrap();
        assert_eq!(json["mtype"], "user_login_response");
        assert_eq!(json["req_id"], 3);
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "invalid token");
    }

    #[test]
    fn unknown_mtype_is_rejected() {
        assert!(serde_json::from_str::<UserCommand>(r#"{"mtype":"chat_login","req_id":1}"#).is_err());
    }

    #[test]
    fn close_codes_round_trip() {
        for code in [
            CloseCode::ServerError,
            CloseCode::WrongDataType,
            CloseCode::FailedToParseMessage,
            CloseCode::InvalidToken,
            CloseCode::Unauthorized,
            CloseCode::AlreadyLoggedIn,
        ] {
            assert_eq!(CloseCode::from_code(code.code()), Some(code));
        }
        assert_eq!(CloseCode::from_code(1000), None);
    }
}
