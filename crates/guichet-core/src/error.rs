use guichet_platform::PlatformError;
use guichet_shared::UserId;
use guichet_store::StoreError;
use thiserror::Error;

/// Everything a ticket operation can refuse or fail with.
///
/// The precondition variants map one-to-one onto messages a host can show
/// the acting user. `Store` and `Platform` wrap faults from below.
#[derive(Error, Debug)]
pub enum TicketError {
    /// The requester is barred from opening tickets in this community.
    #[error("you are not allowed to open tickets here")]
    Blacklisted,

    /// The requester already holds the maximum number of open tickets.
    #[error("you already have {limit} open ticket(s)")]
    LimitExceeded { limit: u32 },

    /// No enabled category under that name.
    #[error("unknown or disabled category \"{name}\"")]
    UnknownCategory { name: String },

    /// The channel carries no ticket record.
    #[error("this channel is not a ticket")]
    NotATicket,

    /// The ticket is already closed. Closed is terminal.
    #[error("this ticket is already closed")]
    TicketClosed,

    /// The actor lacks the standing this operation requires.
    #[error("you are not allowed to do that")]
    Forbidden,

    /// Somebody else claimed the ticket first.
    #[error("ticket is already claimed by {claimant}")]
    AlreadyClaimed { claimant: UserId },

    /// The community has this feature switched off.
    #[error("the {feature} feature is disabled in this community")]
    FeatureDisabled { feature: &'static str },

    /// Feedback ratings run from 1 to 5.
    #[error("rating must be between 1 and 5, got {rating}")]
    InvalidRating { rating: u8 },

    /// The channel no longer exists on the platform.
    #[error("channel not found")]
    ChannelNotFound,

    /// A transcript of an empty channel is no transcript.
    #[error("there are no messages in this channel")]
    NoMessages,

    /// The message is not a registered ticket panel.
    #[error("that message is not a ticket panel")]
    UnknownPanel,

    /// A panel needs at least one enabled category to offer.
    #[error("no enabled categories are configured")]
    NoCategories,

    /// A category under that name already exists.
    #[error("category \"{name}\" already exists")]
    CategoryExists { name: String },

    /// A destructive operation was invoked without its confirmation token.
    #[error("confirmation token missing, pass \"confirm\" to proceed")]
    ConfirmationRequired,

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A required platform call failed.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, TicketError>;
