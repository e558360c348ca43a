pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod session;

pub use connection::{handle_chat_socket, handle_user_socket};
pub use dispatcher::{Delivery, Dispatcher};
pub use registry::{Outbound, SessionHandle, SessionRegistry};

/// Run blocking store work off the async runtime.
pub async fn blocking<T, F>(f: F) -> circle_db::Result<T>
where
    F: FnOnce() -> circle_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| circle_db::Error::Backend(anyhow::anyhow!("blocking task failed: {}", e)))?
}
