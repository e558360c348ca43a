pub mod auth;
pub mod blogs;
pub mod error;
pub mod notifs;
pub mod password;
pub mod sync;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::{ApiError, ApiResult, Body};
