//! Messages flowing through the two worker pools.
//!
//! A message is built once, inside request handling, and is never mutated
//! after it has been enqueued.

use std::fmt;

use plaza_db::entities::{account, block, follow, follow_request, report, status, status_fave};
use serde::{Deserialize, Serialize};

/// The action a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityType {
    Create,
    Update,
    Delete,
    Like,
    Announce,
    Follow,
    Accept,
    Reject,
    Undo,
    Block,
    Flag,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The object an activity acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A regular status.
    Status(Box<status::Model>),
    /// A boost: the boost wrapper status, with `boost_of_id` set.
    Announce(Box<status::Model>),
    StatusFave(status_fave::Model),
    Follow(follow::Model),
    FollowRequest(follow_request::Model),
    Block(block::Model),
    Account(Box<account::Model>),
    Report(report::Model),
    /// Only the `ActivityPub` ID is known, e.g. for a federated delete.
    Iri(String),
}

impl Payload {
    /// Short name of the payload kind, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "Status",
            Self::Announce(_) => "Announce",
            Self::StatusFave(_) => "StatusFave",
            Self::Follow(_) => "Follow",
            Self::FollowRequest(_) => "FollowRequest",
            Self::Block(_) => "Block",
            Self::Account(_) => "Account",
            Self::Report(_) => "Report",
            Self::Iri(_) => "Iri",
        }
    }
}

/// Side effect of an action taken through the client API.
#[derive(Debug, Clone)]
pub struct FromClientApi {
    pub activity: ActivityType,
    pub object: Payload,
    /// The local account that acted.
    pub origin_account: account::Model,
    /// The account acted upon, when there is one.
    pub target_account: Option<account::Model>,
}

impl FromClientApi {
    /// Create a message without a target account.
    #[must_use]
    pub const fn new(activity: ActivityType, object: Payload, origin_account: account::Model) -> Self {
        Self {
            activity,
            object,
            origin_account,
            target_account: None,
        }
    }

    /// Attach the account acted upon.
    #[must_use]
    pub fn with_target(mut self, target_account: account::Model) -> Self {
        self.target_account = Some(target_account);
        self
    }
}

/// Side effect of an activity received from a remote server.
#[derive(Debug, Clone)]
pub struct FromFederator {
    pub activity: ActivityType,
    pub object: Payload,
    /// The remote actor that signed the request.
    pub requesting_account: Option<account::Model>,
    /// The local account whose inbox received the activity.
    pub receiving_account: account::Model,
    /// ID of the received activity or object.
    pub ap_iri: Option<String>,
}

impl FromFederator {
    /// Create a message received in `receiving_account`'s inbox.
    #[must_use]
    pub const fn new(
        activity: ActivityType,
        object: Payload,
        receiving_account: account::Model,
    ) -> Self {
        Self {
            activity,
            object,
            requesting_account: None,
            receiving_account,
            ap_iri: None,
        }
    }

    /// Attach the remote actor that sent the activity.
    #[must_use]
    pub fn with_requester(mut self, requesting_account: account::Model) -> Self {
        self.requesting_account = Some(requesting_account);
        self
    }

    /// Attach the activity ID.
    #[must_use]
    pub fn with_iri(mut self, ap_iri: impl Into<String>) -> Self {
        self.ap_iri = Some(ap_iri.into());
        self
    }
}
