pub mod adapter;
pub mod blogs;
pub mod chats;
pub mod error;
pub mod friends;
pub mod memory;
pub mod migrations;
pub mod notifs;
pub mod sqlite;
pub mod store;
pub mod sync;
pub mod tokens;
pub mod users;
pub mod validate;

pub use adapter::{DocumentStore, Kind, ListMatch};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use sqlite::Database;
pub use store::Store;
pub use users::UserPatch;
