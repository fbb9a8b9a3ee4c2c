//! In-memory [`Platform`] implementation.
//!
//! Backs the test suites and the sandbox console: seeded communities,
//! members and channels live in plain maps behind one lock. Individual
//! operations can be flipped into failures through [`FailPoint`] so callers'
//! best-effort paths can be exercised.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use guichet_shared::{ChannelId, GuildId, MessageId, RoleId, UserId};

use crate::error::{PlatformError, Result};
use crate::platform::Platform;
use crate::types::{AccessOverwrite, ChannelMessage, HistoryOrder, OutboundMessage};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateChannel,
    DeleteChannel,
    SendMessage,
    SendDirect,
    FetchHistory,
}

#[derive(Default)]
struct GuildRecord {
    name: String,
    roles: HashMap<RoleId, String>,
    members: HashMap<UserId, HashSet<RoleId>>,
    admins: HashSet<UserId>,
}

struct ChannelRecord {
    guild: GuildId,
    name: String,
    parent: Option<ChannelId>,
    overwrites: Vec<AccessOverwrite>,
    /// Users granted access after creation.
    extra_access: HashSet<UserId>,
    messages: Vec<ChannelMessage>,
}

#[derive(Default)]
struct MemoryState {
    guilds: HashMap<GuildId, GuildRecord>,
    channels: HashMap<ChannelId, ChannelRecord>,
    user_names: HashMap<UserId, String>,
    dms: HashMap<UserId, Vec<OutboundMessage>>,
    /// Every message delivered through `send_message`, in order.
    sent: Vec<(ChannelId, OutboundMessage)>,
    deleted_channels: Vec<ChannelId>,
    fail: HashSet<FailPoint>,
    next_id: u64,
}

/// A whole chat platform in one process.
pub struct MemoryPlatform {
    identity: UserId,
    state: Mutex<MemoryState>,
}

impl MemoryPlatform {
    /// System identity used by a fresh instance.
    pub const IDENTITY: UserId = UserId(1);

    pub fn new() -> Self {
        let mut state = MemoryState {
            next_id: 1000,
            ..Default::default()
        };
        state.user_names.insert(Self::IDENTITY, "Guichet".to_string());
        Self {
            identity: Self::IDENTITY,
            state: Mutex::new(state),
        }
    }

    fn next_id(state: &mut MemoryState) -> u64 {
        state.next_id += 1;
        state.next_id
    }

    // ------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------

    pub fn add_guild(&self, guild: GuildId, name: &str) {
        let mut state = self.state.lock();
        state.guilds.entry(guild).or_default().name = name.to_string();
    }

    pub fn add_role(&self, guild: GuildId, role: RoleId, name: &str) {
        let mut state = self.state.lock();
        state
            .guilds
            .entry(guild)
            .or_default()
            .roles
            .insert(role, name.to_string());
    }

    pub fn add_member(&self, guild: GuildId, user: UserId, name: &str, roles: &[RoleId]) {
        let mut state = self.state.lock();
        state.user_names.insert(user, name.to_string());
        state
            .guilds
            .entry(guild)
            .or_default()
            .members
            .insert(user, roles.iter().copied().collect());
    }

    pub fn make_admin(&self, guild: GuildId, user: UserId) {
        let mut state = self.state.lock();
        state.guilds.entry(guild).or_default().admins.insert(user);
    }

    /// Append a message authored by `user`, timestamped now.
    pub fn say(&self, channel: ChannelId, user: UserId, content: &str) -> Result<MessageId> {
        self.say_at(channel, user, content, Utc::now())
    }

    /// Append a message with an explicit timestamp (idle-clock control).
    pub fn say_at(
        &self,
        channel: ChannelId,
        user: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<MessageId> {
        let mut state = self.state.lock();
        let id = MessageId(Self::next_id(&mut state));
        let author_name = state
            .user_names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("user-{user}"));
        let record = state
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;
        record.messages.push(ChannelMessage {
            id,
            author: user,
            author_name,
            content: content.to_string(),
            timestamp: at,
        });
        Ok(id)
    }

    // ------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------

    pub fn fail(&self, point: FailPoint) {
        self.state.lock().fail.insert(point);
    }

    pub fn clear_fail(&self, point: FailPoint) {
        self.state.lock().fail.remove(&point);
    }

    fn check_fail(&self, point: FailPoint, what: &str) -> Result<()> {
        if self.state.lock().fail.contains(&point) {
            return Err(PlatformError::Forbidden(format!("{what} refused")));
        }
        Ok(())
    }

    // ------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------

    pub fn channel_exists(&self, channel: ChannelId) -> bool {
        self.state.lock().channels.contains_key(&channel)
    }

    pub fn channel_parent(&self, channel: ChannelId) -> Option<ChannelId> {
        self.state.lock().channels.get(&channel).and_then(|c| c.parent)
    }

    pub fn overwrites_of(&self, channel: ChannelId) -> Vec<AccessOverwrite> {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map(|c| c.overwrites.clone())
            .unwrap_or_default()
    }

    pub fn has_access(&self, channel: ChannelId, user: UserId) -> bool {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map(|c| c.extra_access.contains(&user))
            .unwrap_or(false)
    }

    /// Messages delivered to a channel through `send_message`, in order.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<OutboundMessage> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Direct messages delivered to a user, in order.
    pub fn dms_for(&self, user: UserId) -> Vec<OutboundMessage> {
        self.state.lock().dms.get(&user).cloned().unwrap_or_default()
    }

    /// Channels deleted through `delete_channel`, in order.
    pub fn deleted(&self) -> Vec<ChannelId> {
        self.state.lock().deleted_channels.clone()
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn identity(&self) -> UserId {
        self.identity
    }

    async fn create_channel(
        &self,
        guild: GuildId,
        name: &str,
        parent: Option<ChannelId>,
        overwrites: &[AccessOverwrite],
    ) -> Result<ChannelId> {
        self.check_fail(FailPoint::CreateChannel, "channel creation")?;
        let mut state = self.state.lock();
        if !state.guilds.contains_key(&guild) {
            return Err(PlatformError::GuildNotFound(guild));
        }
        let id = ChannelId(Self::next_id(&mut state));
        state.channels.insert(
            id,
            ChannelRecord {
                guild,
                name: name.to_string(),
                parent,
                overwrites: overwrites.to_vec(),
                extra_access: HashSet::new(),
                messages: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn delete_channel(&self, guild: GuildId, channel: ChannelId, _reason: &str) -> Result<()> {
        self.check_fail(FailPoint::DeleteChannel, "channel deletion")?;
        let mut state = self.state.lock();
        match state.channels.get(&channel) {
            Some(record) if record.guild == guild => {
                state.channels.remove(&channel);
                state.deleted_channels.push(channel);
                Ok(())
            }
            _ => Err(PlatformError::ChannelNotFound(channel)),
        }
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        message: OutboundMessage,
    ) -> Result<MessageId> {
        self.check_fail(FailPoint::SendMessage, "message delivery")?;
        let mut state = self.state.lock();
        let id = MessageId(Self::next_id(&mut state));
        let author_name = state
            .user_names
            .get(&self.identity)
            .cloned()
            .unwrap_or_default();
        let content = message.content.clone().unwrap_or_default();
        let identity = self.identity;
        let record = state
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;
        record.messages.push(ChannelMessage {
            id,
            author: identity,
            author_name,
            content,
            timestamp: Utc::now(),
        });
        state.sent.push((channel, message));
        Ok(id)
    }

    async fn send_direct(&self, user: UserId, message: OutboundMessage) -> Result<MessageId> {
        self.check_fail(FailPoint::SendDirect, "direct message")?;
        let mut state = self.state.lock();
        let id = MessageId(Self::next_id(&mut state));
        state.dms.entry(user).or_default().push(message);
        Ok(id)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;
        record.messages.retain(|m| m.id != message);
        Ok(())
    }

    async fn fetch_history(
        &self,
        channel: ChannelId,
        limit: Option<usize>,
        order: HistoryOrder,
    ) -> Result<Vec<ChannelMessage>> {
        self.check_fail(FailPoint::FetchHistory, "history fetch")?;
        let state = self.state.lock();
        let record = state
            .channels
            .get(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;

        let mut messages = record.messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        if order == HistoryOrder::NewestFirst {
            messages.reverse();
        }
        if let Some(limit) = limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }

    async fn grant_access(&self, channel: ChannelId, user: UserId) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;
        record.extra_access.insert(user);
        Ok(())
    }

    async fn revoke_access(&self, channel: ChannelId, user: UserId) -> Result<()> {
        let mut state = self.state.lock();
        let record = state
            .channels
            .get_mut(&channel)
            .ok_or(PlatformError::ChannelNotFound(channel))?;
        record.extra_access.remove(&user);
        Ok(())
    }

    async fn resolve_role(&self, guild: GuildId, name: &str) -> Result<Option<RoleId>> {
        let state = self.state.lock();
        let record = state
            .guilds
            .get(&guild)
            .ok_or(PlatformError::GuildNotFound(guild))?;
        Ok(record
            .roles
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id))
    }

    async fn member_roles(&self, guild: GuildId, user: UserId) -> Result<Vec<RoleId>> {
        let state = self.state.lock();
        let record = state
            .guilds
            .get(&guild)
            .ok_or(PlatformError::GuildNotFound(guild))?;
        Ok(record
            .members
            .get(&user)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn is_administrator(&self, guild: GuildId, user: UserId) -> Result<bool> {
        let state = self.state.lock();
        let record = state
            .guilds
            .get(&guild)
            .ok_or(PlatformError::GuildNotFound(guild))?;
        Ok(record.admins.contains(&user))
    }

    async fn user_name(&self, user: UserId) -> Result<String> {
        self.state
            .lock()
            .user_names
            .get(&user)
            .cloned()
            .ok_or(PlatformError::UserNotFound(user))
    }

    async fn guild_name(&self, guild: GuildId) -> Result<String> {
        self.state
            .lock()
            .guilds
            .get(&guild)
            .map(|g| g.name.clone())
            .ok_or(PlatformError::GuildNotFound(guild))
    }

    async fn channel_name(&self, channel: ChannelId) -> Result<String> {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map(|c| c.name.clone())
            .ok_or(PlatformError::ChannelNotFound(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = GuildId(1);

    fn platform() -> MemoryPlatform {
        let p = MemoryPlatform::new();
        p.add_guild(GUILD, "Test Community");
        p
    }

    #[tokio::test]
    async fn channel_round_trip() {
        let p = platform();
        let channel = p
            .create_channel(GUILD, "ticket-1", None, &[])
            .await
            .unwrap();
        assert!(p.channel_exists(channel));
        assert_eq!(p.channel_name(channel).await.unwrap(), "ticket-1");

        p.delete_channel(GUILD, channel, "done").await.unwrap();
        assert!(!p.channel_exists(channel));
        assert_eq!(p.deleted(), vec![channel]);

        let err = p.fetch_history(channel, None, HistoryOrder::OldestFirst).await;
        assert!(matches!(err, Err(PlatformError::ChannelNotFound(_))));
    }

    #[tokio::test]
    async fn history_respects_order_and_limit() {
        let p = platform();
        let channel = p.create_channel(GUILD, "general", None, &[]).await.unwrap();

        let base = Utc::now();
        p.say_at(channel, UserId(10), "first", base - chrono::Duration::minutes(3))
            .unwrap();
        p.say_at(channel, UserId(10), "second", base - chrono::Duration::minutes(2))
            .unwrap();
        p.say_at(channel, UserId(10), "third", base - chrono::Duration::minutes(1))
            .unwrap();

        let oldest = p
            .fetch_history(channel, None, HistoryOrder::OldestFirst)
            .await
            .unwrap();
        assert_eq!(
            oldest.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["first", "second", "third"]
        );

        let latest = p
            .fetch_history(channel, Some(1), HistoryOrder::NewestFirst)
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].content, "third");
    }

    #[tokio::test]
    async fn failure_injection_blocks_the_operation() {
        let p = platform();
        p.fail(FailPoint::CreateChannel);
        let err = p.create_channel(GUILD, "ticket-1", None, &[]).await;
        assert!(matches!(err, Err(PlatformError::Forbidden(_))));

        p.clear_fail(FailPoint::CreateChannel);
        assert!(p.create_channel(GUILD, "ticket-1", None, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn roles_and_admin_checks() {
        let p = platform();
        let support = RoleId(50);
        p.add_role(GUILD, support, "Support");
        p.add_member(GUILD, UserId(10), "alice", &[]);
        p.add_member(GUILD, UserId(11), "mara", &[support]);
        p.make_admin(GUILD, UserId(12));

        assert_eq!(p.resolve_role(GUILD, "Support").await.unwrap(), Some(support));
        assert_eq!(p.resolve_role(GUILD, "Missing").await.unwrap(), None);
        assert_eq!(p.member_roles(GUILD, UserId(11)).await.unwrap(), vec![support]);
        assert!(p.member_roles(GUILD, UserId(10)).await.unwrap().is_empty());
        assert!(p.is_administrator(GUILD, UserId(12)).await.unwrap());
        assert!(!p.is_administrator(GUILD, UserId(10)).await.unwrap());
    }

    #[tokio::test]
    async fn access_grants_are_tracked() {
        let p = platform();
        let channel = p.create_channel(GUILD, "ticket-2", None, &[]).await.unwrap();

        p.grant_access(channel, UserId(33)).await.unwrap();
        assert!(p.has_access(channel, UserId(33)));

        p.revoke_access(channel, UserId(33)).await.unwrap();
        assert!(!p.has_access(channel, UserId(33)));
    }

    #[tokio::test]
    async fn direct_messages_accumulate() {
        let p = platform();
        p.send_direct(UserId(10), OutboundMessage::text("hello"))
            .await
            .unwrap();
        p.send_direct(UserId(10), OutboundMessage::text("again"))
            .await
            .unwrap();

        let dms = p.dms_for(UserId(10));
        assert_eq!(dms.len(), 2);
        assert_eq!(dms[0].content.as_deref(), Some("hello"));
    }
}
