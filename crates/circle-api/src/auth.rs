use std::sync::Arc;

use axum::extract::State;
use tracing::{info, warn};

use circle_db::{Error, Store, UserPatch, validate};
use circle_gateway::{Dispatcher, blocking};
use circle_types::api::{
    AccountCreateRequest, AccountDeleteRequest, AccountLoginRequest, AccountLogoutRequest,
    AccountSession, AccountUpdatePasswordRequest, AccountUpdateTokenRequest, Done,
    TokenValidRequest, TokenValidResponse,
};
use circle_types::models::{User, UserInfo};

use crate::error::{ApiError, ApiResult, Body, ok};
use crate::password;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            store: dispatcher.store().clone(),
            dispatcher,
        }
    }

    /// Run store work on a blocking thread.
    pub async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Store) -> circle_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(blocking(move || f(&store)).await?)
    }

    /// Fails with `Unauthorized` unless the token is the user's current one.
    pub async fn authorize(&self, user_id: &str, token: &str) -> Result<(), ApiError> {
        let (user_id, token) = (user_id.to_string(), token.to_string());
        self.with_store(move |store| store.authorize(&user_id, &token)).await
    }

    /// Load a user and check their password. Both a wrong id and a wrong
    /// password look the same to the caller.
    async fn check_password(&self, user: Option<User>, password: String) -> Result<User, ApiError> {
        let Some(user) = user else {
            return Err(Error::unauthorized("wrong username or password").into());
        };
        let hash = user.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || password::verify(&hash, &password))
            .await
            .map_err(|e| ApiError::Hash(e.to_string()))?;
        if !matches {
            warn!("Wrong password for {}", user.username);
            return Err(Error::unauthorized("wrong username or password").into());
        }
        Ok(user)
    }
}

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .map_err(|e| ApiError::Hash(e.to_string()))?
}

pub async fn account_token_valid(
    State(state): State<AppState>,
    Body(req): Body<TokenValidRequest>,
) -> ApiResult<TokenValidResponse> {
    let valid = state
        .with_store(move |store| store.validate_token(&req.user_id, &req.token_hash))
        .await?;
    ok(TokenValidResponse { valid })
}

pub async fn account_create(
    State(state): State<AppState>,
    Body(req): Body<AccountCreateRequest>,
) -> ApiResult<AccountSession> {
    validate::username(&req.username)?;
    validate::nickname(&req.nickname)?;
    validate::password(&req.password)?;

    let password_hash = hash_password(req.password).await?;
    let (user, token) = state
        .with_store(move |store| {
            let user = store.create_user(&req.username, &req.nickname, &password_hash)?;
            let token = store.issue_token(&user.id)?;
            Ok((user, token))
        })
        .await?;

    info!("Account created: {} ({})", user.username, user.id);
    ok(AccountSession {
        id: user.id,
        token,
        nickname: user.nickname,
    })
}

pub async fn account_login(
    State(state): State<AppState>,
    Body(req): Body<AccountLoginRequest>,
) -> ApiResult<AccountSession> {
    let username = req.username.clone();
    let user = state
        .with_store(move |store| store.user_by_username(&username))
        .await?;
    let user = state.check_password(user, req.password).await?;

    let user_id = user.id.clone();
    let token = state
        .with_store(move |store| store.issue_token(&user_id))
        .await?;

    info!("{} logged in", user.username);
    ok(AccountSession {
        id: user.id,
        token,
        nickname: user.nickname,
    })
}

pub async fn account_logout(
    State(state): State<AppState>,
    Body(req): Body<AccountLogoutRequest>,
) -> ApiResult<Done> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let user_id = req.user_id.clone();
    state
        .with_store(move |store| store.revoke_token(&user_id))
        .await?;
    info!("{} logged out", req.user_id);
    ok(Done {})
}

/// Handles both `account_delete` and `account_remove`.
pub async fn account_delete(
    State(state): State<AppState>,
    Body(req): Body<AccountDeleteRequest>,
) -> ApiResult<Done> {
    let user_id = req.user_id.clone();
    let user = state
        .with_store(move |store| store.get_user(&user_id))
        .await?;
    let user = state.check_password(user, req.password).await?;

    let user_id = user.id.clone();
    let chat_ids = state
        .with_store(move |store| {
            let chat_ids: Vec<_> = match store.friend_list(&user_id) {
                Ok(list) => list.list.into_iter().filter_map(|f| f.chat_id).collect(),
                Err(Error::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            store.delete_user(&user_id)?;
            Ok(chat_ids)
        })
        .await?;

    // Open sockets would otherwise linger until their next message.
    state.dispatcher.account_deleted(&user.id, &chat_ids);

    info!("Account deleted: {} ({})", user.username, user.id);
    ok(Done {})
}

pub async fn account_update_t(
    State(state): State<AppState>,
    Body(req): Body<AccountUpdateTokenRequest>,
) -> ApiResult<UserInfo> {
    state.authorize(&req.user_id, &req.token_hash).await?;

    let patch = UserPatch {
        nickname: req.props.nickname,
        ..Default::default()
    };
    let user = state
        .with_store(move |store| store.update_profile(&req.user_id, &patch))
        .await?;
    ok(UserInfo::from(&user))
}

pub async fn account_update_p(
    State(state): State<AppState>,
    Body(req): Body<AccountUpdatePasswordRequest>,
) -> ApiResult<UserInfo> {
    let user_id = req.user_id.clone();
    let user = state
        .with_store(move |store| store.get_user(&user_id))
        .await?;
    let user = state.check_password(user, req.password).await?;

    let password_hash = match req.props.password {
        Some(new_password) => {
            validate::password(&new_password)?;
            Some(hash_password(new_password).await?)
        }
        None => None,
    };
    let patch = UserPatch {
        username: req.props.username,
        nickname: req.props.nickname,
        password_hash,
    };

    let user = state
        .with_store(move |store| store.update_profile(&user.id, &patch))
        .await?;
    ok(UserInfo::from(&user))
}
