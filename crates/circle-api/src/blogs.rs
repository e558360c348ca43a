use axum::extract::State;
use tracing::debug;

use circle_types::api::{
    BlogInsertPostRequest, BlogPostResponse, BlogRemovePostRequest, BlogUpdatePostRequest, Done,
};
use circle_types::models::BlogPostInfo;

use crate::auth::AppState;
use crate::error::{ApiResult, Body, ok};

pub async fn blogs_insert_post(
    State(state): State<AppState>,
    Body(req): Body<BlogInsertPostRequest>,
) -> ApiResult<BlogPostResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let post = state
        .with_store(move |store| store.insert_blog_post(&req.user_id, &req.blog_id, &req.content))
        .await?;
    debug!("New blog post {}", post.id);
    ok(BlogPostResponse {
        postinfo: BlogPostInfo::from(&post),
    })
}

pub async fn blogs_update_post(
    State(state): State<AppState>,
    Body(req): Body<BlogUpdatePostRequest>,
) -> ApiResult<BlogPostResponse> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let post = state
        .with_store(move |store| {
            store.replace_blog_post(&req.user_id, &req.blog_id, &req.post_id, &req.content)
        })
        .await?;
    ok(BlogPostResponse {
        postinfo: BlogPostInfo::from(&post),
    })
}

pub async fn blogs_remove_post(
    State(state): State<AppState>,
    Body(req): Body<BlogRemovePostRequest>,
) -> ApiResult<Done> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    state
        .with_store(move |store| store.remove_blog_post(&req.user_id, &req.blog_id, &req.post_id))
        .await?;
    ok(Done {})
}
