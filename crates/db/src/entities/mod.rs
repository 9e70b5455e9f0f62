//! Database entities.

pub mod account;
pub mod block;
pub mod domain_block;
pub mod follow;
pub mod follow_request;
pub mod media_attachment;
pub mod mute;
pub mod notification;
pub mod report;
pub mod status;
pub mod status_bookmark;
pub mod status_fave;
pub mod user;

pub use account::Entity as Account;
pub use block::Entity as Block;
pub use domain_block::Entity as DomainBlock;
pub use follow::Entity as Follow;
pub use follow_request::Entity as FollowRequest;
pub use media_attachment::Entity as MediaAttachment;
pub use mute::Entity as Mute;
pub use notification::Entity as Notification;
pub use report::Entity as Report;
pub use status::Entity as Status;
pub use status_bookmark::Entity as StatusBookmark;
pub use status_fave::Entity as StatusFave;
pub use user::Entity as User;
