//! `ActivityPub` federation for plaza.
//!
//! - **Contract**: the [`Federator`] trait consumed by the processing core,
//!   implemented over HTTP by [`HttpFederator`]
//! - **Inbox**: [`InboxHandler`] turns received activities into stored
//!   entities and [`plaza_queue::FromFederator`] messages
//! - **Security**: HTTP signatures ([`HttpSigner`], [`HttpVerifier`]) and
//!   actor key generation
//! - **Vocabulary**: actors, notes, collections and activities

pub mod activity;
pub mod actors;
pub mod client;
pub mod convert;
pub mod federator;
pub mod http;
pub mod inbox;
pub mod keys;
pub mod objects;
pub mod request;
pub mod signature;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod urls;

pub use activity::Activity;
pub use actors::{ApActorType, ApEndpoints, ApPerson, ApPublicKey};
pub use client::{ApClient, ApClientError};
pub use federator::{FederatingDb, Federator};
pub use http::HttpFederator;
pub use inbox::InboxHandler;
pub use keys::{ActorKeypair, generate_keypair};
pub use objects::*;
pub use request::InboundRequest;
pub use signature::{HttpSigner, HttpVerifier, SignatureComponents, SignatureError};
pub use urls::UrlConfig;
