use thiserror::Error;

use guichet_shared::{ChannelId, GuildId, UserId};

/// Failures reported by the host platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The acting identity lacks permission for the operation.
    #[error("Missing permission: {0}")]
    Forbidden(String),

    /// The channel does not exist (any more).
    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// The user does not exist or cannot be reached.
    #[error("User {0} not found")]
    UserNotFound(UserId),

    /// The community does not exist.
    #[error("Guild {0} not found")]
    GuildNotFound(GuildId),

    /// Transport-level failure talking to the platform.
    #[error("Platform request failed: {0}")]
    Request(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlatformError>;
