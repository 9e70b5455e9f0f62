//! `ActivityPub` object types.

#![allow(missing_docs)]

mod collection;
mod note;

pub use collection::{OrderedCollection, OrderedCollectionPage, activitystreams_context};
pub use note::{ApAttachment, ApNote, ApObjectType, ApTag, PUBLIC_AUDIENCE};
