use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use circle_api::AppState;
use circle_db::Store;
use circle_server::{app_state, router};

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let state = app_state(Store::in_memory());
        Self {
            router: router(state.clone()),
            state,
        }
    }

    fn store(&self) -> &Store {
        &self.state.store
    }

    /// Account created straight in the store, skipping password hashing.
    fn account(&self, username: &str) -> (String, String) {
        let user = self.store().create_user(username, username, "unused").unwrap();
        let token = self.store().issue_token(&user.id).unwrap();
        (user.id, token)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// POST that must succeed with `success: true`.
    async fn ok(&self, path: &str, body: Value) -> Value {
        let (status, json) = self.post(path, body).await;
        assert_eq!(status, StatusCode::OK, "{path}: {json}");
        assert_eq!(json["success"], true, "{path}: {json}");
        json
    }

    /// POST that must fail as a business-rule failure. Returns the message.
    async fn fails(&self, path: &str, body: Value) -> String {
        let (status, json) = self.post(path, body).await;
        assert_eq!(status, StatusCode::OK, "{path}: {json}");
        assert_eq!(json["success"], false, "{path}: {json}");
        json["message"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn account_lifecycle() {
    let app = TestApp::new();

    let created = app
        .ok(
            "/api/account_create",
            json!({"username": "alice", "nickname": "Alice", "password": "hunter2hunter2"}),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let first_token = created["token"].as_str().unwrap().to_string();
    assert_eq!(created["nickname"], "Alice");

    let message = app
        .fails(
            "/api/account_create",
            json!({"username": "alice", "nickname": "Again", "password": "hunter2hunter2"}),
        )
        .await;
    assert_eq!(message, "username already taken");

    let message = app
        .fails(
            "/api/account_login",
            json!({"username": "alice", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(message, "wrong username or password");

    let login = app
        .ok(
            "/api/account_login",
            json!({"username": "alice", "password": "hunter2hunter2"}),
        )
        .await;
    let token = login["token"].as_str().unwrap().to_string();
    assert_eq!(login["id"], id.as_str());

    let stale = app
        .ok("/api/account_token_valid", json!({"user_id": id, "token_hash": first_token}))
        .await;
    assert_eq!(stale["valid"], false);
    let current = app
        .ok("/api/account_token_valid", json!({"user_id": id, "token_hash": token}))
        .await;
    assert_eq!(current["valid"], true);

    app.ok("/api/account_logout", json!({"user_id": id, "token_hash": token}))
        .await;
    let after = app
        .ok("/api/account_token_valid", json!({"user_id": id, "token_hash": token}))
        .await;
    assert_eq!(after["valid"], false);

    app.ok("/api/account_remove", json!({"user_id": id, "password": "hunter2hunter2"}))
        .await;
    app.fails(
        "/api/account_login",
        json!({"username": "alice", "password": "hunter2hunter2"}),
    )
    .await;
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let app = TestApp::new();
    let message = app
        .fails(
            "/api/account_create",
            json!({"username": "alice", "nickname": "Alice", "password": "short"}),
        )
        .await;
    assert!(message.contains("password"));
}

#[tokio::test]
async fn password_only_update_keeps_profile_timestamp() {
    let app = TestApp::new();
    let created = app
        .ok(
            "/api/account_create",
            json!({"username": "alice", "nickname": "Alice", "password": "first-password"}),
        )
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    let before = app.store().get_user(&id).unwrap().unwrap().updated;

    let info = app
        .ok(
            "/api/account_update_p",
            json!({"user_id": id, "password": "first-password", "props": {"password": "second-password"}}),
        )
        .await;
    assert_eq!(info["updated"], before);

    app.ok(
        "/api/account_login",
        json!({"username": "alice", "password": "second-password"}),
    )
    .await;
}

#[tokio::test]
async fn token_update_renames() {
    let app = TestApp::new();
    let (id, token) = app.account("alice");

    let info = app
        .ok(
            "/api/account_update_t",
            json!({"user_id": id, "token_hash": token, "props": {"nickname": "Ally"}}),
        )
        .await;
    assert_eq!(info["nickname"], "Ally");

    let message = app
        .fails(
            "/api/account_update_t",
            json!({"user_id": id, "token_hash": "bogus", "props": {"nickname": "X"}}),
        )
        .await;
    assert_eq!(message, "token is invalid");
}

#[tokio::test]
async fn malformed_body_uses_failure_shape() {
    let app = TestApp::new();
    let (status, json) = app
        .post("/api/users_search", json!({"search": "missing field name"}))
        .await;
    assert!(status.is_client_error());
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn user_search() {
    let app = TestApp::new();
    let (alice, _) = app.account("alice");
    app.account("bobby");

    let found = app.ok("/api/users_search", json!({"search_str": "ALI"})).await;
    assert_eq!(found["user_ids"], json!([alice]));
}

#[tokio::test]
async fn blog_posts_and_sync() {
    let app = TestApp::new();
    let (id, token) = app.account("alice");

    let blog = app
        .ok("/api/sync_blogs", json!({"blogs": [id], "tss": [0]}))
        .await;
    let blog_ts = blog["changed_blogs"][0]["updated"].as_i64().unwrap();

    let inserted = app
        .ok(
            "/api/blogs_insert_post",
            json!({"user_id": id, "token_hash": token, "blog_id": id, "content": "first"}),
        )
        .await;
    let post_id = inserted["postinfo"]["id"].as_str().unwrap().to_string();
    let created = inserted["postinfo"]["created"].clone();

    let changed = app
        .ok("/api/sync_blogs", json!({"blogs": [id], "tss": [blog_ts]}))
        .await;
    let blog = &changed["changed_blogs"][0];
    assert_eq!(blog["post_ids"], json!([post_id]));
    let blog_ts = blog["updated"].as_i64().unwrap();

    let unchanged = app
        .ok("/api/sync_blogs", json!({"blogs": [id], "tss": [blog_ts]}))
        .await;
    assert_eq!(unchanged["changed_blogs"], json!([]));

    let updated = app
        .ok(
            "/api/blogs_update_post",
            json!({"user_id": id, "token_hash": token, "blog_id": id, "post_id": post_id, "content": "edited"}),
        )
        .await;
    assert_eq!(updated["postinfo"]["created"], created);
    let new_id = updated["postinfo"]["id"].as_str().unwrap().to_string();

    let posts = app
        .ok("/api/get_blog_posts", json!({"posts": [post_id, new_id]}))
        .await;
    assert_eq!(posts["posts"].as_array().unwrap().len(), 1);
    assert_eq!(posts["posts"][0]["content"], "edited");

    let (other, other_token) = app.account("mallory");
    let message = app
        .fails(
            "/api/blogs_remove_post",
            json!({"user_id": other, "token_hash": other_token, "blog_id": id, "post_id": new_id}),
        )
        .await;
    assert_eq!(message, "not the owner of this blog");

    app.ok(
        "/api/blogs_remove_post",
        json!({"user_id": id, "token_hash": token, "blog_id": id, "post_id": new_id}),
    )
    .await;
}

#[tokio::test]
async fn sync_rejects_mismatched_lengths() {
    let app = TestApp::new();
    let (id, token) = app.account("alice");
    app.fails(
        "/api/sync_infos",
        json!({"user_id": id, "token_hash": token, "infos": [id], "tss": []}),
    )
    .await;
}

#[tokio::test]
async fn friend_notifications_sync_and_clear() {
    let app = TestApp::new();
    let (a, _) = app.account("alice");
    let (b, b_token) = app.account("bobby");

    app.state.dispatcher.add_friend(&a, &b).await.unwrap();

    let synced = app
        .ok("/api/sync_notifs", json!({"user_id": b, "token_hash": b_token, "notifs": 0}))
        .await;
    let notifs = &synced["changed_notifs"];
    assert_eq!(notifs["friends_added"], json!([a]));
    let ts = notifs["updated"].as_i64().unwrap();

    let flist = app
        .ok("/api/sync_flist", json!({"user_id": b, "token_hash": b_token, "flist": 0}))
        .await;
    assert_eq!(flist["changed_flist"]["list"][0]["user_id"], a.as_str());

    let cleared = app
        .ok(
            "/api/notifs_clear",
            json!({"user_id": b, "token_hash": b_token, "friends_added": [a]}),
        )
        .await;
    assert_eq!(cleared["friends_added"], json!([]));

    let resynced = app
        .ok("/api/sync_notifs", json!({"user_id": b, "token_hash": b_token, "notifs": ts}))
        .await;
    assert!(resynced["changed_notifs"]["updated"].as_i64().unwrap() > ts);

    let current = resynced["changed_notifs"]["updated"].clone();
    let noop = app
        .ok("/api/sync_notifs", json!({"user_id": b, "token_hash": b_token, "notifs": current}))
        .await;
    assert_eq!(noop["changed_notifs"], Value::Null);
}

#[tokio::test]
async fn chat_posts_are_members_only() {
    let app = TestApp::new();
    let (a, a_token) = app.account("alice");
    let (b, _) = app.account("bobby");
    let (c, c_token) = app.account("carol");

    let chat_id = app
        .state
        .dispatcher
        .add_friend(&a, &b)
        .await
        .unwrap()
        .chat_id
        .unwrap();
    let post = app
        .state
        .dispatcher
        .add_chat_post(&b, &chat_id, "hello")
        .await
        .unwrap();

    let mine = app
        .ok(
            "/api/get_chat_posts",
            json!({"user_id": a, "token_hash": a_token, "posts": [post.id]}),
        )
        .await;
    assert_eq!(mine["posts"][0]["content"], "hello");

    let theirs = app
        .ok(
            "/api/get_chat_posts",
            json!({"user_id": c, "token_hash": c_token, "posts": [post.id]}),
        )
        .await;
    assert_eq!(theirs["posts"], json!([]));

    let chats = app
        .ok(
            "/api/sync_chats",
            json!({"user_id": c, "token_hash": c_token, "chats": [chat_id], "tss": [0]}),
        )
        .await;
    assert_eq!(chats["changed_chats"], json!([]));
}
