use axum::extract::State;

use circle_types::api::NotifsClearRequest;
use circle_types::models::NotifList;

use crate::auth::AppState;
use crate::error::{ApiResult, Body, ok};

/// Acknowledge notifications. Returns the ledger as it stands afterwards.
pub async fn notifs_clear(
    State(state): State<AppState>,
    Body(req): Body<NotifsClearRequest>,
) -> ApiResult<NotifList> {
    state.authorize(&req.user_id, &req.token_hash).await?;
    let user_id = req.user_id.clone();
    let clear = req.into_clear();
    let notifs = state
        .with_store(move |store| store.clear_notifs(&user_id, &clear))
        .await?;
    ok(notifs)
}
