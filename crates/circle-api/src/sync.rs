//! Bulk reads. Clients send what they have cached, with its `updated`
//! stamp, and get back only what changed.

use axum::extract::State;

use circle_types::api::{
    BlogPostsResponse, ChatPostsResponse, GetBlogPostsRequest, GetChatPostsRequest,
    SyncBlogsRequest, SyncBlogsResponse, SyncChatsRequest, SyncChatsResponse, SyncFlistRequest,
    SyncFlistResponse, SyncInfosRequest, SyncInfosResponse, SyncNotifsRequest, SyncNotifsResponse,
};

use crate::auth::AppState;
use crate::error::{ApiResult, Body, ok};

pub async fn get_blog_posts(
    State(state): State<AppState>,
    Body(req): Body<GetBlogPostsRequest>,
) -> ApiResult<BlogPostsResponse> {
    let posts = state
        .with_store(move |store| store.get_blog_posts(&req.posts))
        .await?;
    ok(BlogPostsResponse { posts })
}

pub async fn get_chat_posts(
    State(state): State<AppState>,
    Body(req): Body<GetChatPostsRequest>,
) -> ApiResult<ChatPostsResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let posts = state
        .with_store(move |store| store.chat_posts_for_user(&req.user_id, &req.posts))
        .await?;
    ok(ChatPostsResponse { posts })
}

pub async fn sync_blogs(
    State(state): State<AppState>,
    Body(req): Body<SyncBlogsRequest>,
) -> ApiResult<SyncBlogsResponse> {
    let changed_blogs = state
        .with_store(move |store| store.sync_blogs(&req.blogs, &req.tss))
        .await?;
    ok(SyncBlogsResponse { changed_blogs })
}

pub async fn sync_infos(
    State(state): State<AppState>,
    Body(req): Body<SyncInfosRequest>,
) -> ApiResult<SyncInfosResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let changed_infos = state
        .with_store(move |store| store.sync_infos(&req.infos, &req.tss))
        .await?;
    ok(SyncInfosResponse { changed_infos })
}

pub async fn sync_chats(
    State(state): State<AppState>,
    Body(req): Body<SyncChatsRequest>,
) -> ApiResult<SyncChatsResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let changed_chats = state
        .with_store(move |store| store.sync_chats(&req.user_id, &req.chats, &req.tss))
        .await?;
    ok(SyncChatsResponse { changed_chats })
}

pub async fn sync_flist(
    State(state): State<AppState>,
    Body(req): Body<SyncFlistRequest>,
) -> ApiResult<SyncFlistResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let changed_flist = state
        .with_store(move |store| store.sync_flist(&req.user_id, req.flist))
        .await?;
    ok(SyncFlistResponse { changed_flist })
}

pub async fn sync_notifs(
    State(state): State<AppState>,
    Body(req): Body<SyncNotifsRequest>,
) -> ApiResult<SyncNotifsResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let changed_notifs = state
        .with_store(move |store| store.sync_notifs(&req.user_id, req.notifs))
        .await?;
    ok(SyncNotifsResponse { changed_notifs })
}
