pub mod client;
pub mod config;
pub mod error;
pub mod redact;
pub mod session;
pub mod token;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ApiError;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
