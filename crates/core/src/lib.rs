//! Core business logic for quill.

pub mod services;

pub use services::*;
