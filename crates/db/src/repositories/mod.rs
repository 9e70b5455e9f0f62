//! Database repositories.

mod account;
mod block;
mod domain_block;
mod follow;
mod follow_request;
mod media_attachment;
mod mute;
mod notification;
mod report;
mod status;
mod status_bookmark;
mod status_fave;
mod user;

pub use account::AccountRepository;
pub use block::BlockRepository;
pub use domain_block::DomainBlockRepository;
pub use follow::FollowRepository;
pub use follow_request::FollowRequestRepository;
pub use media_attachment::MediaAttachmentRepository;
pub use mute::MuteRepository;
pub use notification::NotificationRepository;
pub use report::ReportRepository;
pub use status::StatusRepository;
pub use status_bookmark::StatusBookmarkRepository;
pub use status_fave::StatusFaveRepository;
pub use user::UserRepository;
