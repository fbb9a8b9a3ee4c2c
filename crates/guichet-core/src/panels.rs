//! Persistent ticket panels.
//!
//! A panel is a message carrying category buttons or a dropdown. The record
//! lives in the community document; the in-memory binding map is what routes
//! a selection event to [`TicketService::create`]. Bindings snapshot the
//! enabled categories at publication and are rebuilt from the store on every
//! restart, so catalog edits show up after the next rehydration.

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use guichet_shared::{ChannelId, GuildId, MessageId, PanelStyle, UserId};
use guichet_store::{Category, GuildDoc, Panel, Ticket};

use crate::effects::best_effort;
use crate::error::{Result, TicketError};
use crate::messages;
use crate::service::TicketService;

/// Routing data for one published panel.
#[derive(Debug, Clone)]
pub struct PanelBinding {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub style: PanelStyle,
    /// Category names offered by this panel.
    pub categories: Vec<String>,
}

/// Registry of live panels across all communities.
pub struct PanelRegistry {
    service: TicketService,
    bindings: DashMap<MessageId, PanelBinding>,
}

impl PanelRegistry {
    pub fn new(service: TicketService) -> Self {
        Self {
            service,
            bindings: DashMap::new(),
        }
    }

    /// Rebuild the binding map from the store, offering each panel the
    /// categories enabled right now. Returns how many panels came back.
    pub fn rehydrate(&self) -> Result<usize> {
        self.bindings.clear();
        let mut count = 0;
        for guild in self.service.store.guild_ids()? {
            let doc = self.service.store.read(guild)?;
            let categories = enabled_names(&doc);
            for (message, panel) in &doc.panels {
                self.bindings.insert(
                    *message,
                    PanelBinding {
                        guild,
                        channel: panel.channel,
                        style: panel.style,
                        categories: categories.clone(),
                    },
                );
                count += 1;
            }
        }
        info!(panels = count, "panel bindings rehydrated");
        Ok(count)
    }

    /// Publish a panel into `channel`. Admin only; the panel message itself
    /// is a required side effect, so its failure surfaces.
    pub async fn create(
        &self,
        guild: GuildId,
        actor: UserId,
        channel: ChannelId,
        style: PanelStyle,
        title: Option<&str>,
    ) -> Result<MessageId> {
        self.service.ensure_admin(guild, actor).await?;

        let doc = self.service.store.read(guild)?;
        let offered: Vec<(String, Category)> = doc
            .categories
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(name, c)| (name.clone(), c.clone()))
            .collect();
        if offered.is_empty() {
            return Err(TicketError::NoCategories);
        }

        let message = self
            .service
            .platform
            .send_message(
                channel,
                messages::panel_message(
                    title.unwrap_or("Open a ticket"),
                    doc.settings.embed_color,
                    style,
                    &offered,
                ),
            )
            .await?;

        self.service
            .store
            .mutate(guild, move |doc| {
                doc.panels.insert(
                    message,
                    Panel {
                        channel,
                        style,
                        created_at: Utc::now(),
                    },
                );
                Ok::<_, TicketError>(())
            })
            .await?;

        self.bindings.insert(
            message,
            PanelBinding {
                guild,
                channel,
                style,
                categories: offered.into_iter().map(|(name, _)| name).collect(),
            },
        );
        info!(guild_id = %guild, channel_id = %channel, message_id = %message, "panel published");
        Ok(message)
    }

    /// Unregister a panel and take its message down. Admin only; the record
    /// is authoritative, the message removal best-effort.
    pub async fn delete(&self, guild: GuildId, actor: UserId, panel: MessageId) -> Result<()> {
        self.service.ensure_admin(guild, actor).await?;

        let removed: Panel = self
            .service
            .store
            .mutate(guild, move |doc| {
                doc.panels.remove(&panel).ok_or(TicketError::UnknownPanel)
            })
            .await?;

        self.bindings.remove(&panel);
        best_effort(
            "panel message removal",
            self.service
                .platform
                .delete_message(removed.channel, panel)
                .await,
        );
        info!(guild_id = %guild, message_id = %panel, "panel deleted");
        Ok(())
    }

    /// Registered panels of one community. Admin only.
    pub async fn list(&self, guild: GuildId, actor: UserId) -> Result<Vec<(MessageId, Panel)>> {
        self.service.ensure_admin(guild, actor).await?;
        Ok(self.service.store.read(guild)?.panels.into_iter().collect())
    }

    /// Entry point for the host's selection events: a user picked
    /// `category` on the panel hosted by `panel`.
    pub async fn handle_selection(
        &self,
        panel: MessageId,
        user: UserId,
        category: &str,
    ) -> Result<Ticket> {
        let binding = self
            .bindings
            .get(&panel)
            .map(|b| b.value().clone())
            .ok_or(TicketError::UnknownPanel)?;
        if !binding.categories.iter().any(|c| c == category) {
            return Err(TicketError::UnknownCategory {
                name: category.to_string(),
            });
        }
        debug!(message_id = %panel, user_id = %user, category, "panel selection");
        self.service.create(binding.guild, user, Some(category)).await
    }
}

fn enabled_names(doc: &GuildDoc) -> Vec<String> {
    doc.categories
        .iter()
        .filter(|(_, c)| c.enabled)
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use guichet_platform::{MemoryPlatform, Platform};
    use guichet_store::{GuildStore, StoreError};

    use crate::config::RuntimeConfig;

    const GUILD: GuildId = GuildId(100);
    const ADMIN: UserId = UserId(30);
    const MEMBER: UserId = UserId(32);

    async fn setup() -> (PanelRegistry, Arc<MemoryPlatform>, ChannelId) {
        let platform = Arc::new(MemoryPlatform::new());
        platform.add_guild(GUILD, "Test Community");
        platform.add_member(GUILD, ADMIN, "root", &[]);
        platform.make_admin(GUILD, ADMIN);
        platform.add_member(GUILD, MEMBER, "alice", &[]);
        let lobby = platform
            .create_channel(GUILD, "lobby", None, &[])
            .await
            .unwrap();

        let store = Arc::new(GuildStore::open_in_memory().unwrap());
        let config = RuntimeConfig {
            close_grace: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        let service = TicketService::new(store, platform.clone(), config);
        (PanelRegistry::new(service), platform, lobby)
    }

    #[tokio::test]
    async fn test_panel_publishes_offers_and_routes_selections() {
        let (registry, platform, lobby) = setup().await;

        let panel = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Dropdown, None)
            .await
            .unwrap();

        let sent = platform.sent_to(lobby);
        assert_eq!(sent.len(), 1);
        let content = sent[0].panel.as_ref().expect("panel content");
        assert_eq!(content.style, PanelStyle::Dropdown);
        // The default catalog offers five categories.
        assert_eq!(content.options.len(), 5);

        let ticket = registry
            .handle_selection(panel, MEMBER, "Support")
            .await
            .unwrap();
        assert_eq!(ticket.category, "Support");
        assert_eq!(ticket.requester, MEMBER);
    }

    #[tokio::test]
    async fn test_panel_creation_is_admin_only() {
        let (registry, _platform, lobby) = setup().await;
        let err = registry
            .create(GUILD, MEMBER, lobby, PanelStyle::Buttons, None)
            .await;
        assert!(matches!(err, Err(TicketError::Forbidden)));
    }

    #[tokio::test]
    async fn test_panel_needs_an_enabled_category() {
        let (registry, _platform, lobby) = setup().await;
        registry
            .service
            .store
            .mutate(GUILD, |doc| {
                for category in doc.categories.values_mut() {
                    category.enabled = false;
                }
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let err = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Buttons, None)
            .await;
        assert!(matches!(err, Err(TicketError::NoCategories)));
    }

    #[tokio::test]
    async fn test_selection_rejects_unknown_panel_and_category() {
        let (registry, _platform, lobby) = setup().await;

        let err = registry
            .handle_selection(MessageId(999), MEMBER, "General")
            .await;
        assert!(matches!(err, Err(TicketError::UnknownPanel)));

        let panel = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Buttons, None)
            .await
            .unwrap();
        let err = registry.handle_selection(panel, MEMBER, "Nonsense").await;
        assert!(matches!(err, Err(TicketError::UnknownCategory { .. })));
    }

    #[tokio::test]
    async fn test_selection_respects_creation_rules() {
        let (registry, _platform, lobby) = setup().await;
        let panel = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Buttons, None)
            .await
            .unwrap();
        registry
            .service
            .store
            .mutate(GUILD, |doc| {
                doc.blacklist.insert(MEMBER);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let err = registry.handle_selection(panel, MEMBER, "General").await;
        assert!(matches!(err, Err(TicketError::Blacklisted)));
    }

    #[tokio::test]
    async fn test_delete_unbinds_and_removes_the_message() {
        let (registry, platform, lobby) = setup().await;
        let panel = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Buttons, None)
            .await
            .unwrap();

        registry.delete(GUILD, ADMIN, panel).await.unwrap();

        assert!(registry.list(GUILD, ADMIN).await.unwrap().is_empty());
        let err = registry.handle_selection(panel, MEMBER, "General").await;
        assert!(matches!(err, Err(TicketError::UnknownPanel)));
        let history = platform
            .fetch_history(lobby, None, guichet_platform::HistoryOrder::OldestFirst)
            .await
            .unwrap();
        assert!(history.is_empty());

        let err = registry.delete(GUILD, ADMIN, panel).await;
        assert!(matches!(err, Err(TicketError::UnknownPanel)));
    }

    #[tokio::test]
    async fn test_rehydration_restores_bindings_across_restarts() {
        let (registry, platform, lobby) = setup().await;
        let panel = registry
            .create(GUILD, ADMIN, lobby, PanelStyle::Dropdown, None)
            .await
            .unwrap();

        // A fresh registry over the same store knows nothing until rehydrated.
        let service = registry.service.clone();
        let revived = PanelRegistry::new(service);
        let err = revived.handle_selection(panel, MEMBER, "General").await;
        assert!(matches!(err, Err(TicketError::UnknownPanel)));

        assert_eq!(revived.rehydrate().unwrap(), 1);
        let ticket = revived
            .handle_selection(panel, MEMBER, "General")
            .await
            .unwrap();
        assert_eq!(ticket.category, "General");
        assert!(platform.channel_exists(ticket.channel));
    }
}
