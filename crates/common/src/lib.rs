//! Common utilities and shared types for list.
//!
//! This crate provides foundational components used across all list crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: UUID and invite-code generation via [`IdGenerator`]
//! - **Retry**: Exponential backoff for flaky backend calls via [`with_retry`]
//!
//! # Example
//!
//! ```no_run
//! use list_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {} for {}", id, config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod retry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use retry::{RetryConfig, with_retry};
