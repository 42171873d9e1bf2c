//! Common utilities and shared types for quill.
//!
//! This crate provides foundational components used by both services:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID ids and UUID tokens via [`IdGenerator`]
//! - **Storage**: Local filesystem storage for uploaded images
//! - **Validation**: Custom field validators
//!
//! # Example
//!
//! ```no_run
//! use quill_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load("blog-service")?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("{} listening on port {}", id, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use storage::{LocalStorage, StorageBackend, StoredFile, generate_stored_file_name};
