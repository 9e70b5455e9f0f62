//! Processing core of plaza.
//!
//! - **Processor**: [`Processor`] owns the sub-processors, both worker pools
//!   and the timeline manager
//! - **Timelines**: [`timeline::Manager`], per-account caches driven by
//!   injected strategies
//! - **Visibility**: [`visibility::Filter`], who may see which status
//! - **Conversion**: [`typeutils::TypeConverter`], storage models to client
//!   API and `ActivityPub` representations

pub mod api;
pub mod mention;
pub mod processing;
pub mod text;
pub mod timeline;
pub mod typeutils;
pub mod visibility;

pub use processing::{Processor, StreamEvent};
pub use typeutils::{Converter, TypeConverter};
pub use visibility::Filter;
