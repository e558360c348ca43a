use axum::extract::State;

use circle_db::users::SEARCH_LIMIT;
use circle_types::api::{UsersSearchRequest, UsersSearchResponse};

use crate::auth::AppState;
use crate::error::{ApiResult, Body, ok};

pub async fn users_search(
    State(state): State<AppState>,
    Body(req): Body<UsersSearchRequest>,
) -> ApiResult<UsersSearchResponse> {
    let user_ids = state
        .with_store(move |store| store.search_users(&req.search_str, SEARCH_LIMIT))
        .await?;
    ok(UsersSearchResponse { user_ids })
}
