//! Process-level wiring.
//!
//! [`Runtime::start`] assembles the service and its collaborators over one
//! store and one platform handle, rebuilds panel bindings, and starts the
//! idle sweep. [`Runtime::shutdown`] stops background work; an in-flight
//! sweep completes first, nothing new is scheduled after.

use std::sync::Arc;

use tracing::info;

use guichet_platform::Platform;
use guichet_store::GuildStore;

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::feedback::FeedbackCollector;
use crate::panels::PanelRegistry;
use crate::reaper::{IdleReaper, ReaperHandle};
use crate::service::TicketService;
use crate::transcript::TranscriptExporter;

pub struct Runtime {
    service: TicketService,
    panels: Arc<PanelRegistry>,
    feedback: FeedbackCollector,
    transcripts: TranscriptExporter,
    reaper: ReaperHandle,
}

impl Runtime {
    /// Bring the ticket system up over an opened store and platform adapter.
    pub fn start(
        store: Arc<GuildStore>,
        platform: Arc<dyn Platform>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let service = TicketService::new(store.clone(), platform.clone(), config.clone());

        let panels = Arc::new(PanelRegistry::new(service.clone()));
        let rehydrated = panels.rehydrate()?;

        let reaper = IdleReaper::new(service.clone()).spawn(config.sweep_interval);
        info!(
            panels = rehydrated,
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "ticket runtime started"
        );

        Ok(Self {
            service,
            panels,
            feedback: FeedbackCollector::new(store),
            transcripts: TranscriptExporter::new(platform),
            reaper,
        })
    }

    pub fn service(&self) -> &TicketService {
        &self.service
    }

    pub fn panels(&self) -> &PanelRegistry {
        &self.panels
    }

    pub fn feedback(&self) -> &FeedbackCollector {
        &self.feedback
    }

    pub fn transcripts(&self) -> &TranscriptExporter {
        &self.transcripts
    }

    /// Stop background work and wait for it to wind down.
    pub async fn shutdown(self) {
        self.reaper.shutdown().await;
        info!("ticket runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use guichet_platform::{MemoryPlatform, Platform};
    use guichet_shared::{GuildId, PanelStyle, UserId};

    const GUILD: GuildId = GuildId(100);
    const ADMIN: UserId = UserId(30);
    const MEMBER: UserId = UserId(32);

    fn seeded_platform() -> Arc<MemoryPlatform> {
        let platform = Arc::new(MemoryPlatform::new());
        platform.add_guild(GUILD, "Test Community");
        platform.add_member(GUILD, ADMIN, "root", &[]);
        platform.make_admin(GUILD, ADMIN);
        platform.add_member(GUILD, MEMBER, "alice", &[]);
        platform
    }

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            // Long interval: only the immediate first sweep runs in tests.
            sweep_interval: Duration::from_secs(3600),
            close_grace: Duration::ZERO,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panels_survive_a_restart() {
        let platform = seeded_platform();
        let store = Arc::new(GuildStore::open_in_memory().unwrap());
        let lobby = platform
            .create_channel(GUILD, "lobby", None, &[])
            .await
            .unwrap();

        let runtime = Runtime::start(store.clone(), platform.clone(), test_config()).unwrap();
        let panel = runtime
            .panels()
            .create(GUILD, ADMIN, lobby, PanelStyle::Buttons, None)
            .await
            .unwrap();
        runtime.shutdown().await;

        // Same store, fresh runtime: the panel must still route selections.
        let revived = Runtime::start(store, platform.clone(), test_config()).unwrap();
        let ticket = revived
            .panels()
            .handle_selection(panel, MEMBER, "General")
            .await
            .unwrap();
        assert!(platform.channel_exists(ticket.channel));
        revived.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lifecycle_flows_through_one_runtime() {
        let platform = seeded_platform();
        let store = Arc::new(GuildStore::open_in_memory().unwrap());
        let runtime = Runtime::start(store, platform.clone(), test_config()).unwrap();

        let ticket = runtime
            .service()
            .create(GUILD, MEMBER, Some("Support"))
            .await
            .unwrap();
        runtime
            .service()
            .close(GUILD, MEMBER, ticket.channel, Some("sorted"))
            .await
            .unwrap();
        runtime
            .feedback()
            .record(MEMBER, ticket.channel, 5, None)
            .await
            .unwrap();

        assert_eq!(runtime.feedback().average(MEMBER).unwrap(), Some(5.0));
        let stats = runtime.service().user_stats(GUILD, MEMBER).unwrap();
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.average_rating, Some(5.0));

        runtime.shutdown().await;
    }
}
