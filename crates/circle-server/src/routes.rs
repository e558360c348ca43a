use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use circle_api::{AppState, auth, blogs, notifs, sync, users};
use circle_gateway::{handle_chat_socket, handle_user_socket};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Accounts
        .route("/account_token_valid", post(auth::account_token_valid))
        .route("/account_create", post(auth::account_create))
        .route("/account_delete", post(auth::account_delete))
        .route("/account_remove", post(auth::account_delete))
        .route("/account_login", post(auth::account_login))
        .route("/account_logout", post(auth::account_logout))
        .route("/account_update_t", post(auth::account_update_t))
        .route("/account_update_p", post(auth::account_update_p))
        // Users
        .route("/users_search", post(users::users_search))
        // Blogs
        .route("/blogs_insert_post", post(blogs::blogs_insert_post))
        .route("/blogs_remove_post", post(blogs::blogs_remove_post))
        .route("/blogs_update_post", post(blogs::blogs_update_post))
        // Notifications
        .route("/notifs_clear", post(notifs::notifs_clear))
        // Get & sync
        .route("/get_blog_posts", post(sync::get_blog_posts))
        .route("/get_chat_posts", post(sync::get_chat_posts))
        .route("/sync_blogs", post(sync::sync_blogs))
        .route("/sync_infos", post(sync::sync_infos))
        .route("/sync_chats", post(sync::sync_chats))
        .route("/sync_flist", post(sync::sync_flist))
        .route("/sync_notifs", post(sync::sync_notifs))
        // Realtime
        .route("/ws_user", get(ws_user))
        .route("/ws_chat", get(ws_chat));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_user(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| handle_user_socket(socket, dispatcher))
}

async fn ws_chat(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| handle_chat_socket(socket, dispatcher))
}
