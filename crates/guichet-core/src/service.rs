//! Ticket lifecycle operations.
//!
//! A ticket moves through exactly three states: open and unclaimed, open and
//! claimed, closed. Closed is terminal. Every transition is applied through
//! the store's document lock, so concurrent commands for the same community
//! serialize; platform work (channel creation, notifications) happens outside
//! the lock.
//!
//! Required side effects (the ticket channel itself) surface their failures.
//! Courtesy side effects (welcome message, DMs, audit log) go through
//! [`crate::effects::best_effort`] and can never fail an operation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use guichet_platform::{Access, AccessOverwrite, OverwriteTarget, Platform};
use guichet_shared::{naming, ChannelId, GuildId, UserId};
use guichet_store::{GuildSettings, GuildStore, Ticket, TicketStatus};

use crate::config::RuntimeConfig;
use crate::effects::{best_effort, schedule_channel_deletion};
use crate::error::{Result, TicketError};
use crate::messages;

/// Close reason recorded when the idle reaper closes a ticket.
pub(crate) const REASON_INACTIVITY: &str = "closed automatically (inactivity)";
/// Close reason recorded when a ticket's channel turned out to be gone.
pub(crate) const REASON_CHANNEL_GONE: &str = "channel deleted";

/// Aggregate counts for one community.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildStats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    /// Ticket count per category, busiest first.
    pub by_category: Vec<(String, usize)>,
    pub panels: usize,
}

/// Aggregate counts for one user within a community.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStats {
    pub created: usize,
    pub open: usize,
    pub closed: usize,
    /// Mean of the user's feedback ratings, if they left any.
    pub average_rating: Option<f64>,
}

/// The ticket state machine and its side effects.
///
/// Cheap to clone; all state lives behind the store and the platform handle.
#[derive(Clone)]
pub struct TicketService {
    pub(crate) store: Arc<GuildStore>,
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) config: RuntimeConfig,
}

impl TicketService {
    pub fn new(store: Arc<GuildStore>, platform: Arc<dyn Platform>, config: RuntimeConfig) -> Self {
        Self {
            store,
            platform,
            config,
        }
    }

    // ------------------------------------------------------------
    // Permission predicates
    // ------------------------------------------------------------

    /// Staff standing: guild administrator, or member of a configured
    /// support or admin role.
    async fn is_staff(&self, guild: GuildId, user: UserId, settings: &GuildSettings) -> Result<bool> {
        if self.platform.is_administrator(guild, user).await? {
            return Ok(true);
        }
        let member_roles = self.platform.member_roles(guild, user).await?;
        Ok(settings
            .support_roles
            .iter()
            .chain(&settings.admin_roles)
            .any(|r| member_roles.contains(r)))
    }

    /// Admin standing: guild administrator, or member of a configured
    /// admin role. Support roles do not qualify.
    pub(crate) async fn is_admin(
        &self,
        guild: GuildId,
        user: UserId,
        settings: &GuildSettings,
    ) -> Result<bool> {
        if self.platform.is_administrator(guild, user).await? {
            return Ok(true);
        }
        let member_roles = self.platform.member_roles(guild, user).await?;
        Ok(settings.admin_roles.iter().any(|r| member_roles.contains(r)))
    }

    /// The requester may close their own ticket; staff may close any.
    async fn can_close(
        &self,
        guild: GuildId,
        actor: UserId,
        ticket: &Ticket,
        settings: &GuildSettings,
    ) -> Result<bool> {
        if actor == ticket.requester {
            return Ok(true);
        }
        self.is_staff(guild, actor, settings).await
    }

    // ------------------------------------------------------------
    // Create
    // ------------------------------------------------------------

    /// Open a ticket for `requester`, in `category` or the community default.
    ///
    /// The ticket number is drawn before the channel exists; if channel
    /// creation fails the number stays consumed. Numbers are unique and
    /// strictly increasing, not gap-free.
    pub async fn create(
        &self,
        guild: GuildId,
        requester: UserId,
        category: Option<&str>,
    ) -> Result<Ticket> {
        let doc = self.store.read(guild)?;
        let settings = doc.settings.clone();

        if doc.blacklist.contains(&requester) {
            return Err(TicketError::Blacklisted);
        }
        if doc.open_ticket_count(requester) >= settings.ticket_limit as usize {
            return Err(TicketError::LimitExceeded {
                limit: settings.ticket_limit,
            });
        }

        let category_name = category.unwrap_or(&settings.default_category).to_string();
        let cat = doc
            .categories
            .get(&category_name)
            .filter(|c| c.enabled)
            .ok_or_else(|| TicketError::UnknownCategory {
                name: category_name.clone(),
            })?
            .clone();

        let number: u64 = self
            .store
            .mutate(guild, |doc| {
                doc.counter += 1;
                Ok::<_, TicketError>(doc.counter)
            })
            .await?;

        let requester_name = match self.platform.user_name(requester).await {
            Ok(name) => name,
            Err(e) => {
                debug!(user_id = %requester, error = %e, "requester name lookup failed, using id");
                requester.to_string()
            }
        };
        let channel_name = naming::ticket_channel_name(
            &settings.ticket_name_format,
            number,
            &requester_name,
            &category_name,
        );

        let overwrites = self.channel_overwrites(requester, &settings);
        let channel = self
            .platform
            .create_channel(guild, &channel_name, settings.parent_channel, &overwrites)
            .await?;

        let ticket = Ticket {
            number,
            channel,
            requester,
            category: category_name.clone(),
            status: TicketStatus::Open,
            claimed_by: None,
            created_at: Utc::now(),
            closed_at: None,
            close_reason: None,
            closed_by: None,
            warning_sent: false,
        };

        // Insert under the document lock, re-checking the limit now that we
        // hold it. A lost race deletes the channel we just created.
        let record = ticket.clone();
        let inserted: Result<()> = self
            .store
            .mutate(guild, move |doc| {
                if doc.open_ticket_count(requester) >= doc.settings.ticket_limit as usize {
                    return Err(TicketError::LimitExceeded {
                        limit: doc.settings.ticket_limit,
                    });
                }
                doc.tickets.insert(channel, record);
                Ok(())
            })
            .await;
        if let Err(e) = inserted {
            best_effort(
                "ticket channel rollback",
                self.platform
                    .delete_channel(guild, channel, "ticket creation aborted")
                    .await,
            );
            return Err(e);
        }

        info!(guild_id = %guild, channel_id = %channel, number, requester = %requester, "ticket created");

        let ping = messages::ping_content(&settings);
        best_effort(
            "welcome message",
            self.platform
                .send_message(channel, messages::welcome_message(&settings, &cat, &ticket, ping))
                .await,
        );
        if settings.dm_notifications {
            let guild_name = self.guild_label(guild).await;
            best_effort(
                "creation notification",
                self.platform
                    .send_direct(requester, messages::created_dm(&guild_name, &ticket, cat.color))
                    .await,
            );
        }
        self.log_event(
            guild,
            &settings,
            format!(
                "🎫 Ticket #{} created by {} ({})",
                number,
                requester.mention(),
                category_name
            ),
        )
        .await;

        Ok(ticket)
    }

    // ------------------------------------------------------------
    // Close
    // ------------------------------------------------------------

    /// Close a ticket on behalf of `actor`.
    ///
    /// The channel is deleted after the configured grace delay, off this
    /// call's path. Closing an already closed ticket is an error.
    pub async fn close(
        &self,
        guild: GuildId,
        actor: UserId,
        channel: ChannelId,
        reason: Option<&str>,
    ) -> Result<Ticket> {
        let doc = self.store.read(guild)?;
        let settings = doc.settings.clone();
        let ticket = doc.tickets.get(&channel).ok_or(TicketError::NotATicket)?;
        if !ticket.is_open() {
            return Err(TicketError::TicketClosed);
        }
        if !self.can_close(guild, actor, ticket, &settings).await? {
            return Err(TicketError::Forbidden);
        }

        let reason = reason.unwrap_or("no reason given").to_string();
        self.close_internal(guild, actor, channel, reason, &settings)
            .await
    }

    /// The terminal transition, shared by manual close and the idle reaper.
    /// Permission checks are the caller's business.
    pub(crate) async fn close_internal(
        &self,
        guild: GuildId,
        closer: UserId,
        channel: ChannelId,
        reason: String,
        settings: &GuildSettings,
    ) -> Result<Ticket> {
        let closed: Ticket = self
            .store
            .mutate(guild, move |doc| {
                let ticket = doc.tickets.get_mut(&channel).ok_or(TicketError::NotATicket)?;
                if !ticket.is_open() {
                    return Err(TicketError::TicketClosed);
                }
                ticket.status = TicketStatus::Closed;
                ticket.closed_at = Some(Utc::now());
                ticket.close_reason = Some(reason);
                ticket.closed_by = Some(closer);
                Ok(ticket.clone())
            })
            .await?;

        info!(
            guild_id = %guild,
            channel_id = %channel,
            number = closed.number,
            closed_by = %closer,
            "ticket closed"
        );

        schedule_channel_deletion(
            self.platform.clone(),
            guild,
            channel,
            self.config.close_grace,
            format!("ticket #{} closed", closed.number),
        );

        if settings.feedback_enabled {
            let guild_name = self.guild_label(guild).await;
            best_effort(
                "feedback request",
                self.platform
                    .send_direct(
                        closed.requester,
                        messages::feedback_prompt(&guild_name, &closed, settings.embed_color),
                    )
                    .await,
            );
        }
        self.log_event(
            guild,
            settings,
            format!(
                "🔒 Ticket #{} closed by {} ({})",
                closed.number,
                closer.mention(),
                closed.close_reason.as_deref().unwrap_or("-")
            ),
        )
        .await;

        Ok(closed)
    }

    // ------------------------------------------------------------
    // Claim
    // ------------------------------------------------------------

    /// Assign an open, unclaimed ticket to `actor`. First writer wins;
    /// the loser of a race learns who beat them.
    pub async fn claim(&self, guild: GuildId, actor: UserId, channel: ChannelId) -> Result<Ticket> {
        let doc = self.store.read(guild)?;
        let settings = doc.settings.clone();
        if !settings.claim_enabled {
            return Err(TicketError::FeatureDisabled { feature: "claim" });
        }
        if !doc.tickets.contains_key(&channel) {
            return Err(TicketError::NotATicket);
        }
        if !self.is_staff(guild, actor, &settings).await? {
            return Err(TicketError::Forbidden);
        }

        // Check-and-set under the document lock.
        let ticket = self
            .store
            .mutate(guild, move |doc| {
                let ticket = doc.tickets.get_mut(&channel).ok_or(TicketError::NotATicket)?;
                if !ticket.is_open() {
                    return Err(TicketError::TicketClosed);
                }
                if let Some(claimant) = ticket.claimed_by {
                    return Err(TicketError::AlreadyClaimed { claimant });
                }
                ticket.claimed_by = Some(actor);
                Ok(ticket.clone())
            })
            .await?;

        info!(guild_id = %guild, channel_id = %channel, number = ticket.number, claimed_by = %actor, "ticket claimed");

        best_effort(
            "claim announcement",
            self.platform
                .send_message(channel, messages::claim_announcement(actor, settings.embed_color))
                .await,
        );
        if settings.notify_on_claim {
            let guild_name = self.guild_label(guild).await;
            best_effort(
                "claim notification",
                self.platform
                    .send_direct(
                        ticket.requester,
                        messages::claim_dm(&guild_name, ticket.number, actor, settings.embed_color),
                    )
                    .await,
            );
        }
        self.log_event(
            guild,
            &settings,
            format!("🙋 Ticket #{} claimed by {}", ticket.number, actor.mention()),
        )
        .await;

        Ok(ticket)
    }

    // ------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------

    /// Give another user access to a ticket channel. Staff only.
    pub async fn add_participant(
        &self,
        guild: GuildId,
        actor: UserId,
        channel: ChannelId,
        user: UserId,
    ) -> Result<()> {
        let doc = self.store.read(guild)?;
        let settings = doc.settings.clone();
        let ticket = doc.tickets.get(&channel).ok_or(TicketError::NotATicket)?;
        if !ticket.is_open() {
            return Err(TicketError::TicketClosed);
        }
        if !self.is_staff(guild, actor, &settings).await? {
            return Err(TicketError::Forbidden);
        }

        self.platform.grant_access(channel, user).await?;
        info!(guild_id = %guild, channel_id = %channel, user_id = %user, "participant added");
        self.log_event(
            guild,
            &settings,
            format!("➕ {} added to ticket #{}", user.mention(), ticket.number),
        )
        .await;
        Ok(())
    }

    /// Revoke a user's access to a ticket channel. Staff only; the
    /// requester cannot be removed from their own ticket.
    pub async fn remove_participant(
        &self,
        guild: GuildId,
        actor: UserId,
        channel: ChannelId,
        user: UserId,
    ) -> Result<()> {
        let doc = self.store.read(guild)?;
        let settings = doc.settings.clone();
        let ticket = doc.tickets.get(&channel).ok_or(TicketError::NotATicket)?;
        if !ticket.is_open() {
            return Err(TicketError::TicketClosed);
        }
        if !self.is_staff(guild, actor, &settings).await? {
            return Err(TicketError::Forbidden);
        }
        if user == ticket.requester {
            return Err(TicketError::Forbidden);
        }

        self.platform.revoke_access(channel, user).await?;
        info!(guild_id = %guild, channel_id = %channel, user_id = %user, "participant removed");
        self.log_event(
            guild,
            &settings,
            format!("➖ {} removed from ticket #{}", user.mention(), ticket.number),
        )
        .await;
        Ok(())
    }

    // ------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------

    /// The ticket record behind a channel, open or closed.
    pub fn ticket_info(&self, guild: GuildId, channel: ChannelId) -> Result<Ticket> {
        let doc = self.store.read(guild)?;
        doc.tickets
            .get(&channel)
            .cloned()
            .ok_or(TicketError::NotATicket)
    }

    /// Community-wide ticket counts.
    pub fn guild_stats(&self, guild: GuildId) -> Result<GuildStats> {
        let doc = self.store.read(guild)?;
        let total = doc.tickets.len();
        let open = doc.open_tickets().count();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for ticket in doc.tickets.values() {
            *counts.entry(ticket.category.as_str()).or_default() += 1;
        }
        let mut by_category: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        by_category.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(GuildStats {
            total,
            open,
            closed: total - open,
            by_category,
            panels: doc.panels.len(),
        })
    }

    /// One user's ticket counts and mean feedback rating.
    pub fn user_stats(&self, guild: GuildId, user: UserId) -> Result<UserStats> {
        let doc = self.store.read(guild)?;
        let created = doc
            .tickets
            .values()
            .filter(|t| t.requester == user)
            .count();
        let open = doc.open_ticket_count(user);

        let feedback = self.store.read_user(user)?.feedback;
        let average_rating = if feedback.is_empty() {
            None
        } else {
            Some(feedback.iter().map(|f| f.rating as f64).sum::<f64>() / feedback.len() as f64)
        };

        Ok(UserStats {
            created,
            open,
            closed: created - open,
            average_rating,
        })
    }

    // ------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------

    fn channel_overwrites(
        &self,
        requester: UserId,
        settings: &GuildSettings,
    ) -> Vec<AccessOverwrite> {
        let mut overwrites = vec![
            AccessOverwrite::new(OverwriteTarget::Everyone, Access::Denied),
            AccessOverwrite::new(OverwriteTarget::User(requester), Access::Participant),
            AccessOverwrite::new(OverwriteTarget::User(self.platform.identity()), Access::Manager),
        ];
        for role in &settings.support_roles {
            overwrites.push(AccessOverwrite::new(
                OverwriteTarget::Role(*role),
                Access::Moderator,
            ));
        }
        overwrites
    }

    async fn guild_label(&self, guild: GuildId) -> String {
        match self.platform.guild_name(guild).await {
            Ok(name) => name,
            Err(_) => guild.to_string(),
        }
    }

    /// Post one line to the community's audit log channel, if configured.
    pub(crate) async fn log_event(&self, guild: GuildId, settings: &GuildSettings, text: String) {
        let Some(log_channel) = settings.log_channel else {
            return;
        };
        best_effort(
            "audit log",
            self.platform
                .send_message(log_channel, messages::audit_embed(&text, settings.embed_color))
                .await,
        );
    }
}
