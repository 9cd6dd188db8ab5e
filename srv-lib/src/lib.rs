pub mod config;
pub mod db;
pub mod errors;
pub mod link;
pub mod memory;
pub mod protocol;
pub mod schema;
pub mod store;

pub use errors::{ProtocolError, StoreError};
pub use memory::MemoryStore;
pub use protocol::{Published, SecretProtocol};
pub use store::SecretStore;
