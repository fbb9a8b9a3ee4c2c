//! The administrative surface: settings, the category catalog, the
//! blacklist, and destructive maintenance.
//!
//! Every operation here is gated on admin standing. Setters funnel through
//! [`TicketService::update_settings`] so the settings are re-normalized on
//! every write and bad combinations never reach disk.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use tracing::{info, warn};

use guichet_shared::{ChannelId, GuildId, RoleId, UserId};
use guichet_store::{Category, GuildSettings};

use crate::error::{Result, TicketError};
use crate::service::TicketService;

impl TicketService {
    /// Refuse anyone without admin standing.
    pub(crate) async fn ensure_admin(&self, guild: GuildId, actor: UserId) -> Result<()> {
        let doc = self.store.read(guild)?;
        if self.is_admin(guild, actor, &doc.settings).await? {
            Ok(())
        } else {
            Err(TicketError::Forbidden)
        }
    }

    async fn update_settings<F>(&self, guild: GuildId, actor: UserId, f: F) -> Result<()>
    where
        F: FnOnce(&mut GuildSettings),
    {
        self.ensure_admin(guild, actor).await?;
        self.store
            .mutate(guild, move |doc| {
                f(&mut doc.settings);
                doc.settings.normalize();
                Ok::<_, TicketError>(())
            })
            .await
    }

    // ------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------

    /// Current settings, admin eyes only.
    pub async fn settings(&self, guild: GuildId, actor: UserId) -> Result<GuildSettings> {
        self.ensure_admin(guild, actor).await?;
        Ok(self.store.read(guild)?.settings)
    }

    /// Parent channel (category container) new ticket channels go under.
    pub async fn set_parent_channel(
        &self,
        guild: GuildId,
        actor: UserId,
        parent: Option<ChannelId>,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.parent_channel = parent)
            .await
    }

    /// Replace the support role list.
    pub async fn set_support_roles(
        &self,
        guild: GuildId,
        actor: UserId,
        roles: Vec<RoleId>,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.support_roles = roles)
            .await
    }

    /// Replace the admin role list.
    pub async fn set_admin_roles(
        &self,
        guild: GuildId,
        actor: UserId,
        roles: Vec<RoleId>,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.admin_roles = roles)
            .await
    }

    /// Open tickets one user may hold at once. Zero is unrepresentable.
    pub async fn set_ticket_limit(
        &self,
        guild: GuildId,
        actor: UserId,
        limit: NonZeroU32,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.ticket_limit = limit.get())
            .await
    }

    /// Default category used when a creation names none.
    pub async fn set_default_category(
        &self,
        guild: GuildId,
        actor: UserId,
        name: String,
    ) -> Result<()> {
        self.ensure_admin(guild, actor).await?;
        self.store
            .mutate(guild, move |doc| {
                if !doc.categories.contains_key(&name) {
                    return Err(TicketError::UnknownCategory { name });
                }
                doc.settings.default_category = name;
                doc.settings.normalize();
                Ok(())
            })
            .await
    }

    /// Welcome template; `{user}`, `{ticket_id}` and `{category}` expand.
    pub async fn set_welcome_message(
        &self,
        guild: GuildId,
        actor: UserId,
        template: String,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.welcome_message = template)
            .await
    }

    /// Channel name template; `{counter}`, `{user}` and `{category}` expand.
    pub async fn set_name_format(
        &self,
        guild: GuildId,
        actor: UserId,
        template: String,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.ticket_name_format = template)
            .await
    }

    /// Audit log channel; `None` disables audit logging.
    pub async fn set_log_channel(
        &self,
        guild: GuildId,
        actor: UserId,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.log_channel = channel)
            .await
    }

    /// Idle thresholds in hours; `hours` of zero disables auto-close.
    /// The warning window is clamped to the threshold on write.
    pub async fn set_auto_close(
        &self,
        guild: GuildId,
        actor: UserId,
        hours: u32,
        warning_hours: u32,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| {
            s.auto_close_hours = hours;
            s.auto_close_warning_hours = warning_hours;
        })
        .await
    }

    pub async fn set_claim_enabled(
        &self,
        guild: GuildId,
        actor: UserId,
        enabled: bool,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.claim_enabled = enabled)
            .await
    }

    /// Whether claiming announces itself to the requester by DM.
    pub async fn set_claim_notifications(
        &self,
        guild: GuildId,
        actor: UserId,
        enabled: bool,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.notify_on_claim = enabled)
            .await
    }

    pub async fn set_feedback_enabled(
        &self,
        guild: GuildId,
        actor: UserId,
        enabled: bool,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.feedback_enabled = enabled)
            .await
    }

    pub async fn set_dm_notifications(
        &self,
        guild: GuildId,
        actor: UserId,
        enabled: bool,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.dm_notifications = enabled)
            .await
    }

    pub async fn set_ping_on_create(
        &self,
        guild: GuildId,
        actor: UserId,
        enabled: bool,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.ping_on_create = enabled)
            .await
    }

    /// Role pinged on creation instead of the support roles.
    pub async fn set_ping_role(
        &self,
        guild: GuildId,
        actor: UserId,
        role: Option<RoleId>,
    ) -> Result<()> {
        self.update_settings(guild, actor, |s| s.ping_role = role).await
    }

    pub async fn set_embed_color(&self, guild: GuildId, actor: UserId, color: u32) -> Result<()> {
        self.update_settings(guild, actor, |s| s.embed_color = color)
            .await
    }

    // ------------------------------------------------------------
    // Category catalog
    // ------------------------------------------------------------

    /// The full catalog, disabled categories included.
    pub async fn categories(
        &self,
        guild: GuildId,
        actor: UserId,
    ) -> Result<BTreeMap<String, Category>> {
        self.ensure_admin(guild, actor).await?;
        Ok(self.store.read(guild)?.categories)
    }

    /// Add a category under a fresh name.
    pub async fn add_category(
        &self,
        guild: GuildId,
        actor: UserId,
        name: String,
        category: Category,
    ) -> Result<()> {
        self.ensure_admin(guild, actor).await?;
        let added = name.clone();
        self.store
            .mutate(guild, move |doc| {
                if doc.categories.contains_key(&name) {
                    return Err(TicketError::CategoryExists { name });
                }
                doc.categories.insert(name, category);
                Ok(())
            })
            .await?;
        info!(guild_id = %guild, category = %added, "category added");
        Ok(())
    }

    /// Drop a category. Existing ticket records keep its name.
    pub async fn remove_category(&self, guild: GuildId, actor: UserId, name: &str) -> Result<()> {
        self.ensure_admin(guild, actor).await?;
        let name = name.to_string();
        let removed = name.clone();
        self.store
            .mutate(guild, move |doc| match doc.categories.remove(&name) {
                Some(_) => Ok(()),
                None => Err(TicketError::UnknownCategory { name }),
            })
            .await?;
        info!(guild_id = %guild, category = %removed, "category removed");
        Ok(())
    }

    /// Flip a category's enabled flag; returns the new state.
    pub async fn toggle_category(&self, guild: GuildId, actor: UserId, name: &str) -> Result<bool> {
        self.ensure_admin(guild, actor).await?;
        let name = name.to_string();
        self.store
            .mutate(guild, move |doc| match doc.categories.get_mut(&name) {
                Some(category) => {
                    category.enabled = !category.enabled;
                    Ok(category.enabled)
                }
                None => Err(TicketError::UnknownCategory { name }),
            })
            .await
    }

    // ------------------------------------------------------------
    // Blacklist
    // ------------------------------------------------------------

    /// Users currently barred from creating tickets.
    pub async fn blacklist(&self, guild: GuildId, actor: UserId) -> Result<Vec<UserId>> {
        self.ensure_admin(guild, actor).await?;
        Ok(self.store.read(guild)?.blacklist.into_iter().collect())
    }

    /// Bar a user. Returns false if they already were.
    pub async fn blacklist_add(&self, guild: GuildId, actor: UserId, user: UserId) -> Result<bool> {
        self.ensure_admin(guild, actor).await?;
        let added = self
            .store
            .mutate(guild, move |doc| {
                Ok::<_, TicketError>(doc.blacklist.insert(user))
            })
            .await?;
        if added {
            info!(guild_id = %guild, user_id = %user, "user blacklisted");
        }
        Ok(added)
    }

    /// Unbar a user. Returns false if they were not barred.
    pub async fn blacklist_remove(
        &self,
        guild: GuildId,
        actor: UserId,
        user: UserId,
    ) -> Result<bool> {
        self.ensure_admin(guild, actor).await?;
        let removed = self
            .store
            .mutate(guild, move |doc| {
                Ok::<_, TicketError>(doc.blacklist.remove(&user))
            })
            .await?;
        if removed {
            info!(guild_id = %guild, user_id = %user, "user removed from blacklist");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------

    /// Wipe the community document: settings, categories, tickets, panels,
    /// blacklist, counter. Channels on the platform are left alone.
    ///
    /// Destructive and un-undoable, so the caller must pass the literal
    /// confirmation token `confirm`.
    pub async fn reset(&self, guild: GuildId, actor: UserId, confirmation: &str) -> Result<()> {
        self.ensure_admin(guild, actor).await?;
        if confirmation != "confirm" {
            return Err(TicketError::ConfirmationRequired);
        }
        self.store.reset(guild).await?;
        warn!(guild_id = %guild, "community ticket state reset");
        Ok(())
    }

    /// One-step setup: find a role literally named `Support` and register
    /// it as a support role. Returns the role if one was found.
    pub async fn quick_setup(&self, guild: GuildId, actor: UserId) -> Result<Option<RoleId>> {
        self.ensure_admin(guild, actor).await?;
        let role = self.platform.resolve_role(guild, "Support").await?;
        if let Some(role) = role {
            self.store
                .mutate(guild, move |doc| {
                    if !doc.settings.support_roles.contains(&role) {
                        doc.settings.support_roles.push(role);
                    }
                    Ok::<_, TicketError>(())
                })
                .await?;
            info!(guild_id = %guild, role_id = %role, "quick setup registered support role");
        }
        Ok(role)
    }
}
