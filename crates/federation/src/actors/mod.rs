//! `ActivityPub` actor types.

#![allow(missing_docs)]

mod person;

pub use person::{ApActorType, ApEndpoints, ApPerson, ApPublicKey};
