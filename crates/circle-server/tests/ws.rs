use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use circle_api::{AppState, password};
use circle_db::Store;
use circle_server::{app_state, router};
use circle_types::events::CloseCode;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> (SocketAddr, AppState) {
    let state = app_state(Store::in_memory());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn account(state: &AppState, username: &str) -> (String, String) {
    let user = state.store.create_user(username, username, "unused").unwrap();
    let token = state.store.issue_token(&user.id).unwrap();
    (user.id, token)
}

async fn connect(addr: SocketAddr, channel: &str) -> Ws {
    let (ws, _) = connect_async(format!("ws://{addr}/api/{channel}")).await.unwrap();
    ws
}

async fn send(ws: &mut Ws, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next frame that is not a heartbeat.
async fn recv(ws: &mut Ws) -> Message {
    loop {
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if !msg.is_ping() && !msg.is_pong() {
            return msg;
        }
    }
}

async fn recv_json(ws: &mut Ws) -> Value {
    match recv(ws).await {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected text, got {other:?}"),
    }
}

async fn recv_close(ws: &mut Ws) -> Option<CloseCode> {
    match recv(ws).await {
        Message::Close(Some(frame)) => CloseCode::from_code(u16::from(frame.code)),
        other => panic!("expected close, got {other:?}"),
    }
}

async fn user_login(ws: &mut Ws, user_id: &str, token: &str) -> Value {
    send(
        ws,
        json!({"mtype": "user_login", "req_id": 1, "user_id": user_id, "token_hash": token}),
    )
    .await;
    recv_json(ws).await
}

#[tokio::test]
async fn second_login_is_rejected_and_first_stays_usable() {
    let (addr, state) = spawn_server().await;
    let (a, token) = account(&state, "alice");
    let (b, _) = account(&state, "bobby");

    let mut first = connect(addr, "ws_user").await;
    let reply = user_login(&mut first, &a, &token).await;
    assert_eq!(reply["success"], true);

    let mut second = connect(addr, "ws_user").await;
    let reply = user_login(&mut second, &a, &token).await;
    assert_eq!(reply["mtype"], "user_login_response");
    assert_eq!(reply["success"], false);
    assert_eq!(reply["message"], CloseCode::AlreadyLoggedIn.reason());

    send(&mut first, json!({"mtype": "friend_add", "req_id": 2, "friend_id": b})).await;
    let reply = recv_json(&mut first).await;
    assert_eq!(reply["mtype"], "friend_add_response");
    assert_eq!(reply["req_id"], 2);
    assert_eq!(reply["success"], true);
    assert_eq!(reply["friend"]["user_id"], b.as_str());
}

#[tokio::test]
async fn friend_add_reaches_online_friend() {
    let (addr, state) = spawn_server().await;
    let (a, a_token) = account(&state, "alice");
    let (b, b_token) = account(&state, "bobby");

    let mut alice = connect(addr, "ws_user").await;
    let mut bobby = connect(addr, "ws_user").await;
    user_login(&mut alice, &a, &a_token).await;
    user_login(&mut bobby, &b, &b_token).await;

    send(&mut alice, json!({"mtype": "friend_add", "req_id": 5, "friend_id": b})).await;
    let reply = recv_json(&mut alice).await;
    assert_eq!(reply["success"], true);

    let notif = recv_json(&mut bobby).await;
    assert_eq!(notif["mtype"], "friend_add_notif");
    assert_eq!(notif["friend"]["user_id"], a.as_str());
    assert_eq!(notif["friend"]["chat_id"], reply["friend"]["chat_id"]);

    let ledger = state.store.read_notifs(&b).unwrap();
    assert!(ledger.friends_added.is_empty());
}

#[tokio::test]
async fn command_before_login_closes() {
    let (addr, _state) = spawn_server().await;
    let mut ws = connect(addr, "ws_user").await;
    send(&mut ws, json!({"mtype": "friend_add", "req_id": 1, "friend_id": "x"})).await;
    assert_eq!(recv_close(&mut ws).await, Some(CloseCode::Unauthorized));
}

#[tokio::test]
async fn binary_frame_closes() {
    let (addr, _state) = spawn_server().await;
    let mut ws = connect(addr, "ws_user").await;
    ws.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    assert_eq!(recv_close(&mut ws).await, Some(CloseCode::WrongDataType));
}

#[tokio::test]
async fn replaced_token_closes_on_next_command() {
    let (addr, state) = spawn_server().await;
    let (a, token) = account(&state, "alice");
    let (b, _) = account(&state, "bobby");

    let mut ws = connect(addr, "ws_user").await;
    assert_eq!(user_login(&mut ws, &a, &token).await["success"], true);

    // Logging in elsewhere replaces the token.
    state.store.issue_token(&a).unwrap();

    send(&mut ws, json!({"mtype": "friend_add", "req_id": 2, "friend_id": b})).await;
    assert_eq!(recv_close(&mut ws).await, Some(CloseCode::InvalidToken));
    assert!(!state.store.has_pair(&a, &b).unwrap());
}

#[tokio::test]
async fn chat_post_for_offline_member_lands_in_ledger() {
    let (addr, state) = spawn_server().await;
    let (a, a_token) = account(&state, "alice");
    let (b, b_token) = account(&state, "bobby");
    let chat_id = state
        .dispatcher
        .add_friend(&a, &b)
        .await
        .unwrap()
        .chat_id
        .unwrap();

    // Bobby was online once and left.
    let mut bobby = connect(addr, "ws_user").await;
    user_login(&mut bobby, &b, &b_token).await;
    bobby.close(None).await.unwrap();
    timeout(WAIT, async {
        while state.dispatcher.registry().users().has(&b) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let mut alice = connect(addr, "ws_chat").await;
    send(
        &mut alice,
        json!({"mtype": "chat_login", "req_id": 1, "user_id": a, "token_hash": a_token, "chat_id": chat_id}),
    )
    .await;
    assert_eq!(recv_json(&mut alice).await["success"], true);

    send(&mut alice, json!({"mtype": "chat_add_post", "req_id": 2, "content": "you there?"})).await;
    let reply = recv_json(&mut alice).await;
    assert_eq!(reply["mtype"], "chat_add_post_response");
    assert_eq!(reply["success"], true);
    let post_id = reply["post"]["id"].as_str().unwrap().to_string();

    let ledger = state.store.read_notifs(&b).unwrap();
    assert_eq!(ledger.chat_activity, vec![chat_id.clone()]);

    let chats = state.store.sync_chats(&b, &[chat_id], &[0]).unwrap();
    assert_eq!(chats.len(), 1);
    assert!(chats[0].post_ids.contains(&post_id));
}

#[tokio::test]
async fn chat_post_reaches_member_in_chat_view() {
    let (addr, state) = spawn_server().await;
    let (a, a_token) = account(&state, "alice");
    let (b, b_token) = account(&state, "bobby");
    let chat_id = state
        .dispatcher
        .add_friend(&a, &b)
        .await
        .unwrap()
        .chat_id
        .unwrap();

    let mut alice = connect(addr, "ws_chat").await;
    let mut bobby = connect(addr, "ws_chat").await;
    for (ws, user, token) in [(&mut alice, &a, &a_token), (&mut bobby, &b, &b_token)] {
        send(
            ws,
            json!({"mtype": "chat_login", "req_id": 1, "user_id": user, "token_hash": token, "chat_id": chat_id}),
        )
        .await;
        assert_eq!(recv_json(ws).await["success"], true);
    }

    send(&mut alice, json!({"mtype": "chat_add_post", "req_id": 2, "content": "hi"})).await;
    assert_eq!(recv_json(&mut alice).await["success"], true);

    let event = recv_json(&mut bobby).await;
    assert_eq!(event["mtype"], "chat_add_post_event");
    assert_eq!(event["post"]["content"], "hi");
    assert_eq!(event["post"]["user_id"], a.as_str());
    assert!(state.store.read_notifs(&b).unwrap().chat_activity.is_empty());
}

#[tokio::test]
async fn deleting_an_account_closes_its_sockets() {
    let (addr, state) = spawn_server().await;
    let hash = password::hash("correct horse").unwrap();
    let a = state.store.create_user("alice", "Alice", &hash).unwrap().id;
    let a_token = state.store.issue_token(&a).unwrap();
    let (b, b_token) = account(&state, "bobby");
    let chat_id = state
        .dispatcher
        .add_friend(&a, &b)
        .await
        .unwrap()
        .chat_id
        .unwrap();

    let mut alice = connect(addr, "ws_user").await;
    assert_eq!(user_login(&mut alice, &a, &a_token).await["success"], true);
    let mut bobby = connect(addr, "ws_chat").await;
    send(
        &mut bobby,
        json!({"mtype": "chat_login", "req_id": 1, "user_id": b, "token_hash": b_token, "chat_id": chat_id}),
    )
    .await;
    assert_eq!(recv_json(&mut bobby).await["success"], true);

    let request = Request::builder()
        .method("POST")
        .uri("/api/account_delete")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"user_id": a, "password": "correct horse"}).to_string(),
        ))
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(recv_close(&mut alice).await, Some(CloseCode::InvalidToken));
    assert_eq!(recv_close(&mut bobby).await, Some(CloseCode::Unauthorized));
    assert!(!state.store.has_pair(&b, &a).unwrap());
}
