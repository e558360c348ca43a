pub mod config;
pub mod routes;

use std::sync::Arc;

use circle_api::{AppState, AppStateInner};
use circle_db::Store;
use circle_gateway::{Dispatcher, SessionRegistry};

pub use config::{ServerConfig, StoreMode};
pub use routes::router;

/// Shared state for a fresh process: an empty session registry over `store`.
pub fn app_state(store: Store) -> AppState {
    Arc::new(AppStateInner::new(Dispatcher::new(store, SessionRegistry::new())))
}
