use serde::{Deserialize, Serialize};

use crate::models::{Blog, BlogPost, BlogPostInfo, Chat, ChatPost, FriendList, NotifList, UserInfo};
use crate::{RecordId, TimeStamp};

// -- Envelopes --

/// Successful HTTP body: `{"success": true, ...data}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Success<T> {
    pub fn new(data: T) -> Self {
        Self { success: true, data }
    }
}

/// Failed HTTP body: `{"success": false, "message": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Failure {
    pub success: bool,
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Empty payload for endpoints that only report success.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Done {}

// -- Accounts --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenValidRequest {
    pub user_id: RecordId,
    pub token_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenValidResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountCreateRequest {
    pub username: String,
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountLoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both account creation and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountSession {
    pub id: RecordId,
    pub token: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountLogoutRequest {
    pub user_id: RecordId,
    pub token_hash: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountDeleteRequest {
    pub user_id: RecordId,
    pub password: String,
}

/// Profile fields a token holder may change.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TokenPatch {
    pub nickname: Option<String>,
}

/// Profile fields that require the current password.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordPatch {
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountUpdateTokenRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    #[serde(default)]
    pub props: TokenPatch,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccountUpdatePasswordRequest {
    pub user_id: RecordId,
    pub password: String,
    #[serde(default)]
    pub props: PasswordPatch,
}

// -- Users --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UsersSearchRequest {
    pub search_str: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersSearchResponse {
    pub user_ids: Vec<RecordId>,
}

// -- Blogs --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlogInsertPostRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub blog_id: RecordId,
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlogUpdatePostRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub blog_id: RecordId,
    pub post_id: RecordId,
    pub content: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlogRemovePostRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub blog_id: RecordId,
    pub post_id: RecordId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlogPostResponse {
    pub postinfo: BlogPostInfo,
}

// -- Notifications --

/// Ids to acknowledge, per category. Absent categories are left untouched.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct NotifClear {
    pub friends_added: Option<Vec<RecordId>>,
    pub friends_removed: Option<Vec<RecordId>>,
    pub chat_activity: Option<Vec<RecordId>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotifsClearRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub friends_added: Option<Vec<RecordId>>,
    pub friends_removed: Option<Vec<RecordId>>,
    pub chat_activity: Option<Vec<RecordId>>,
}

impl NotifsClearRequest {
    pub fn into_clear(self) -> NotifClear {
        NotifClear {
            friends_added: self.friends_added,
            friends_removed: self.friends_removed,
            chat_activity: self.chat_activity,
        }
    }
}

// -- Get & sync --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GetBlogPostsRequest {
    pub posts: Vec<RecordId>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GetChatPostsRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub posts: Vec<RecordId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlogPostsResponse {
    pub posts: Vec<BlogPost>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPostsResponse {
    pub posts: Vec<ChatPost>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncInfosRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub infos: Vec<RecordId>,
    pub tss: Vec<TimeStamp>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncBlogsRequest {
    pub blogs: Vec<RecordId>,
    pub tss: Vec<TimeStamp>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncChatsRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub chats: Vec<RecordId>,
    pub tss: Vec<TimeStamp>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncFlistRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub flist: TimeStamp,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncNotifsRequest {
    pub user_id: RecordId,
    pub token_hash: String,
    pub notifs: TimeStamp,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncInfosResponse {
    pub changed_infos: Vec<UserInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncBlogsResponse {
    pub changed_blogs: Vec<Blog>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncChatsResponse {
    pub changed_chats: Vec<Chat>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncFlistResponse {
    pub changed_flist: Option<FriendList>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncNotifsResponse {
    pub changed_notifs: Option<NotifList>,
}
