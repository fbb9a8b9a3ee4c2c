//! The narrow interface to the host chat platform.

use async_trait::async_trait;

use guichet_shared::{ChannelId, GuildId, MessageId, RoleId, UserId};

use crate::error::Result;
use crate::types::{AccessOverwrite, ChannelMessage, HistoryOrder, OutboundMessage};

/// Everything the ticket system needs from the outside world.
///
/// Implementations adapt a concrete gateway library; all methods take `&self`
/// and implementations must be shareable across tasks (`Send + Sync`).
/// Inbound events flow the other way: the adapter calls the core's entry
/// points (ticket commands, panel selections) when its gateway delivers them.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The system's own user id: message author, ticket closer for
    /// auto-closes, holder of the manager overwrite on ticket channels.
    fn identity(&self) -> UserId;

    /// Create a channel and return its id.
    async fn create_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
        overwrites: &[AccessOverwrite],
    ) -> Result<ChannelId>;

    /// Delete a channel. The reason lands in the platform's own audit trail.
    async fn delete_channel(&self, guild: GuildId, channel: ChannelId, reason: &str) -> Result<()>;

    /// Deliver a message to a channel.
    async fn send_message(&self, channel: ChannelId, message: OutboundMessage)
        -> Result<MessageId>;

    /// Deliver a direct message to a user.
    async fn send_direct(&self, user: UserId, message: OutboundMessage) -> Result<MessageId>;

    /// Delete a single message.
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    /// Fetch channel history. `limit` of `None` means the full history.
    async fn fetch_history(
        &self,
        channel: ChannelId,
        limit: Option<usize>,
        order: HistoryOrder,
    ) -> Result<Vec<ChannelMessage>>;

    /// Grant a user participant access on a channel.
    async fn grant_access(&self, channel: ChannelId, user: UserId) -> Result<()>;

    /// Remove a user's access overwrite from a channel.
    async fn revoke_access(&self, channel: ChannelId, user: UserId) -> Result<()>;

    /// Find a role by name.
    async fn resolve_role(&self, guild: GuildId, name: &str) -> Result<Option<RoleId>>;

    /// Roles a member currently holds.
    async fn member_roles(&self, guild: GuildId, user: UserId) -> Result<Vec<RoleId>>;

    /// Whether a member has administrator standing in the community.
    async fn is_administrator(&self, guild: GuildId, user: UserId) -> Result<bool>;

    /// Display name of a user.
    async fn user_name(&self, user: UserId) -> Result<String>;

    /// Display name of a community.
    async fn guild_name(&self, guild: GuildId) -> Result<String>;

    /// Name of a channel.
    async fn channel_name(&self, channel: ChannelId) -> Result<String>;
}
