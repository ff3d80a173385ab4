//! classquiz-store — Result persistence backends.
//!
//! Implements the `ResultStore` and `QuizSource` traits against the LMS HTTP
//! backend, plus an in-memory store for offline sessions and tests.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;

pub use config::{create_store, load_config_from, ClassquizConfig};
pub use error::StoreError;
pub use http::HttpResultStore;
pub use memory::InMemoryStore;
