//! Common utilities and shared types for plaza.
//!
//! This crate provides foundational components used across all plaza crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error taxonomy via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based sortable identifiers via [`IdGenerator`]
//! - **Metrics**: Worker pool, timeline and federation counters via [`Metrics`]
//! - **Storage**: Media storage backends via [`StorageBackend`]
//!
//! # Example
//!
//! ```no_run
//! use plaza_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("{} generated {id}", config.server.url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use metrics::{Metrics, MetricsSnapshot, get_metrics};
pub use storage::{LocalStorage, StorageBackend, UploadedFile, generate_storage_key};
