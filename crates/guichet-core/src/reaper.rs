//! The idle reaper.
//!
//! A periodic sweep over every community and every open ticket. Idle time is
//! measured from the newest message in the ticket channel, whoever wrote it.
//! Inside the warning window the ticket gets exactly one heads-up; past the
//! threshold it is closed under the system identity. A ticket whose channel
//! vanished outside our control is closed out too, so records cannot linger
//! open forever.
//!
//! One ticket's failure never stops the sweep, and one sweep's failure never
//! stops the loop.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use guichet_platform::{HistoryOrder, PlatformError};
use guichet_shared::GuildId;
use guichet_store::{GuildSettings, Ticket};

use crate::effects::best_effort;
use crate::error::{Result, TicketError};
use crate::messages;
use crate::service::{TicketService, REASON_CHANNEL_GONE, REASON_INACTIVITY};

pub struct IdleReaper {
    service: TicketService,
}

impl IdleReaper {
    pub fn new(service: TicketService) -> Self {
        Self { service }
    }

    /// Start the sweep loop. The first sweep runs immediately, then every
    /// `interval`. Returns a handle that stops the loop on request.
    pub fn spawn(self, interval: Duration) -> ReaperHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = stopped.changed() => {
                        info!("idle reaper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            warn!(error = %e, "idle sweep failed, retrying next tick");
                        }
                    }
                }
            }
        });
        ReaperHandle { stop, task }
    }

    /// One pass over every community. Per-community failures are logged and
    /// skipped; only a store enumeration failure aborts the pass.
    pub async fn sweep(&self) -> Result<()> {
        let guilds = self.service.store.guild_ids()?;
        debug!(communities = guilds.len(), "idle sweep started");
        for guild in guilds {
            if let Err(e) = self.sweep_guild(guild).await {
                warn!(guild_id = %guild, error = %e, "idle sweep failed for community");
            }
        }
        Ok(())
    }

    async fn sweep_guild(&self, guild: GuildId) -> Result<()> {
        let doc = self.service.store.read(guild)?;
        let settings = doc.settings.clone();
        if settings.auto_close_hours == 0 {
            return Ok(());
        }

        let threshold = settings.auto_close_hours as i64;
        // Never negative: normalize clamps the warning window to the threshold.
        let warn_after = threshold - settings.auto_close_warning_hours as i64;

        for ticket in doc.open_tickets() {
            if let Err(e) = self
                .evaluate(guild, &settings, ticket, threshold, warn_after)
                .await
            {
                warn!(
                    guild_id = %guild,
                    channel_id = %ticket.channel,
                    error = %e,
                    "skipping ticket in idle sweep"
                );
            }
        }
        Ok(())
    }

    async fn evaluate(
        &self,
        guild: GuildId,
        settings: &GuildSettings,
        ticket: &Ticket,
        threshold: i64,
        warn_after: i64,
    ) -> Result<()> {
        let channel = ticket.channel;
        let newest = match self
            .service
            .platform
            .fetch_history(channel, Some(1), HistoryOrder::NewestFirst)
            .await
        {
            Ok(messages) => messages.into_iter().next(),
            Err(PlatformError::ChannelNotFound(_)) => {
                // The record outlived its channel; close it out rather than
                // carrying it open forever.
                warn!(
                    guild_id = %guild,
                    channel_id = %channel,
                    number = ticket.number,
                    "ticket channel vanished, closing the record"
                );
                self.service
                    .close_internal(
                        guild,
                        self.service.platform.identity(),
                        channel,
                        REASON_CHANNEL_GONE.to_string(),
                        settings,
                    )
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        // A channel nobody ever wrote in has no idle clock.
        let Some(newest) = newest else {
            return Ok(());
        };

        let idle_hours = (Utc::now() - newest.timestamp).num_hours();

        if idle_hours >= threshold {
            info!(
                guild_id = %guild,
                channel_id = %channel,
                number = ticket.number,
                idle_hours,
                "auto-closing idle ticket"
            );
            best_effort(
                "auto-close notice",
                self.service
                    .platform
                    .send_message(channel, messages::auto_close_notice(idle_hours))
                    .await,
            );
            self.service
                .close_internal(
                    guild,
                    self.service.platform.identity(),
                    channel,
                    REASON_INACTIVITY.to_string(),
                    settings,
                )
                .await?;
        } else if idle_hours >= warn_after {
            // Claim the flag under the document lock; only the claimant
            // sends, so repeated sweeps cannot double-warn.
            let claimed = self
                .service
                .store
                .mutate(guild, move |doc| {
                    let Some(t) = doc.tickets.get_mut(&channel) else {
                        return Ok(false);
                    };
                    if !t.is_open() || t.warning_sent {
                        return Ok(false);
                    }
                    t.warning_sent = true;
                    Ok::<_, TicketError>(true)
                })
                .await?;
            if claimed {
                info!(
                    guild_id = %guild,
                    channel_id = %channel,
                    number = ticket.number,
                    idle_hours,
                    "sending idle warning"
                );
                best_effort(
                    "idle warning",
                    self.service
                        .platform
                        .send_message(channel, messages::idle_warning(threshold - idle_hours))
                        .await,
                );
            }
        }
        Ok(())
    }
}

/// Stops the reaper loop; any in-flight sweep completes first.
pub struct ReaperHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use guichet_platform::{FailPoint, MemoryPlatform, Platform};
    use guichet_shared::UserId;
    use guichet_store::{GuildStore, StoreError, TicketStatus};

    use crate::config::RuntimeConfig;

    const GUILD: GuildId = GuildId(100);
    const REQUESTER: UserId = UserId(10);

    async fn setup() -> (IdleReaper, TicketService, Arc<MemoryPlatform>) {
        let platform = Arc::new(MemoryPlatform::new());
        platform.add_guild(GUILD, "Test Community");
        platform.add_member(GUILD, REQUESTER, "alice", &[]);

        let store = Arc::new(GuildStore::open_in_memory().unwrap());
        let config = RuntimeConfig {
            close_grace: std::time::Duration::ZERO,
            ..RuntimeConfig::default()
        };
        let service = TicketService::new(store, platform.clone(), config);
        (IdleReaper::new(service.clone()), service, platform)
    }

    /// Open a ticket whose newest message is `idle_hours` old. The welcome
    /// message is suppressed so the backdated message stays newest.
    async fn idle_ticket(
        service: &TicketService,
        platform: &MemoryPlatform,
        idle_hours: i64,
    ) -> guichet_shared::ChannelId {
        platform.fail(FailPoint::SendMessage);
        let ticket = service.create(GUILD, REQUESTER, None).await.unwrap();
        platform.clear_fail(FailPoint::SendMessage);
        platform
            .say_at(
                ticket.channel,
                REQUESTER,
                "anyone there?",
                Utc::now() - ChronoDuration::hours(idle_hours),
            )
            .unwrap();
        ticket.channel
    }

    fn warnings_in(platform: &MemoryPlatform, channel: guichet_shared::ChannelId) -> usize {
        platform
            .sent_to(channel)
            .iter()
            .filter(|m| {
                m.embed
                    .as_ref()
                    .and_then(|e| e.title.as_deref())
                    .is_some_and(|t| t.contains("Inactivity warning"))
            })
            .count()
    }

    #[tokio::test]
    async fn test_sweep_warns_exactly_once_inside_the_window() {
        let (reaper, service, platform) = setup().await;
        // Threshold 72h, warning window 24h: warnings start at 48h idle.
        let channel = idle_ticket(&service, &platform, 50).await;

        reaper.sweep().await.unwrap();
        assert_eq!(warnings_in(&platform, channel), 1);
        assert!(service.ticket_info(GUILD, channel).unwrap().warning_sent);

        // Repeated sweeps must not warn again.
        reaper.sweep().await.unwrap();
        reaper.sweep().await.unwrap();
        assert_eq!(warnings_in(&platform, channel), 1);
        assert!(service.ticket_info(GUILD, channel).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_sweep_leaves_fresh_tickets_alone() {
        let (reaper, service, platform) = setup().await;
        let channel = idle_ticket(&service, &platform, 2).await;

        reaper.sweep().await.unwrap();

        assert_eq!(warnings_in(&platform, channel), 0);
        assert!(service.ticket_info(GUILD, channel).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_sweep_closes_past_the_threshold() {
        let (reaper, service, platform) = setup().await;
        let channel = idle_ticket(&service, &platform, 80).await;

        reaper.sweep().await.unwrap();

        let ticket = service.ticket_info(GUILD, channel).unwrap();
        assert_eq!(ticket.status, TicketStatus::Closed);
        assert_eq!(ticket.closed_by, Some(MemoryPlatform::IDENTITY));
        assert_eq!(ticket.close_reason.as_deref(), Some(REASON_INACTIVITY));

        // Notice first, then the channel goes away (grace is zero in tests).
        let titles: Vec<String> = platform
            .sent_to(channel)
            .iter()
            .filter_map(|m| m.embed.as_ref().and_then(|e| e.title.clone()))
            .collect();
        assert!(titles.iter().any(|t| t.contains("Closed due to inactivity")));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!platform.channel_exists(channel));
    }

    #[tokio::test]
    async fn test_sweep_respects_disabled_auto_close() {
        let (reaper, service, platform) = setup().await;
        service
            .store
            .mutate(GUILD, |doc| {
                doc.settings.auto_close_hours = 0;
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();
        let channel = idle_ticket(&service, &platform, 500).await;

        reaper.sweep().await.unwrap();

        assert!(service.ticket_info(GUILD, channel).unwrap().is_open());
        assert_eq!(warnings_in(&platform, channel), 0);
    }

    #[tokio::test]
    async fn test_sweep_closes_records_whose_channel_vanished() {
        let (reaper, service, platform) = setup().await;
        let ticket = service.create(GUILD, REQUESTER, None).await.unwrap();
        platform
            .delete_channel(GUILD, ticket.channel, "moderator cleanup")
            .await
            .unwrap();

        reaper.sweep().await.unwrap();

        let record = service.ticket_info(GUILD, ticket.channel).unwrap();
        assert_eq!(record.status, TicketStatus::Closed);
        assert_eq!(record.close_reason.as_deref(), Some(REASON_CHANNEL_GONE));
    }

    #[tokio::test]
    async fn test_orphan_and_idle_ticket_are_handled_in_one_sweep() {
        let (reaper, service, platform) = setup().await;
        let orphan = service.create(GUILD, REQUESTER, None).await.unwrap();
        platform
            .delete_channel(GUILD, orphan.channel, "gone")
            .await
            .unwrap();
        let idle = idle_ticket(&service, &platform, 80).await;

        reaper.sweep().await.unwrap();

        assert!(!service.ticket_info(GUILD, orphan.channel).unwrap().is_open());
        assert!(!service.ticket_info(GUILD, idle).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_sweep_survives_history_fetch_failures() {
        let (reaper, service, platform) = setup().await;
        let channel = idle_ticket(&service, &platform, 80).await;

        platform.fail(FailPoint::FetchHistory);
        reaper.sweep().await.unwrap();
        assert!(service.ticket_info(GUILD, channel).unwrap().is_open());

        // The next sweep, with the platform healthy again, catches up.
        platform.clear_fail(FailPoint::FetchHistory);
        reaper.sweep().await.unwrap();
        assert!(!service.ticket_info(GUILD, channel).unwrap().is_open());
    }

    #[tokio::test]
    async fn test_channels_without_messages_have_no_idle_clock() {
        let (reaper, service, platform) = setup().await;
        platform.fail(FailPoint::SendMessage);
        let ticket = service.create(GUILD, REQUESTER, None).await.unwrap();
        platform.clear_fail(FailPoint::SendMessage);

        reaper.sweep().await.unwrap();

        assert!(service.ticket_info(GUILD, ticket.channel).unwrap().is_open());
        assert_eq!(warnings_in(&platform, ticket.channel), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawned_loop_sweeps_and_shuts_down() {
        let (reaper, service, platform) = setup().await;
        let channel = idle_ticket(&service, &platform, 80).await;

        let handle = reaper.spawn(std::time::Duration::from_millis(20));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        handle.shutdown().await;

        assert!(!service.ticket_info(GUILD, channel).unwrap().is_open());
    }
}
