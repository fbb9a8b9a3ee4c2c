//! # guichet-sandbox
//!
//! An interactive console running the whole ticket engine in one process:
//! in-memory store, in-memory platform, seeded community. Every command maps
//! onto a core operation, so the sandbox doubles as a living demo of the
//! public surface without a gateway connection.

mod repl;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use guichet_core::{IdleReaper, Runtime, RuntimeConfig};
use guichet_platform::{MemoryPlatform, Platform};
use guichet_shared::{GuildId, RoleId, UserId};
use guichet_store::GuildStore;

/// The seeded community.
const GUILD: GuildId = GuildId(100);
const SUPPORT_ROLE: RoleId = RoleId(70);
const ADMIN: UserId = UserId(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,guichet_core=debug")),
        )
        .init();

    info!("Starting guichet sandbox v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = RuntimeConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Seed the in-process world
    // -----------------------------------------------------------------------
    let platform = Arc::new(MemoryPlatform::new());
    let users = seed_world(&platform);
    let lobby = platform.create_channel(GUILD, "lobby", None, &[]).await?;

    let store = Arc::new(GuildStore::open_in_memory()?);

    // -----------------------------------------------------------------------
    // 4. Start the ticket runtime
    // -----------------------------------------------------------------------
    let runtime = Runtime::start(store, platform.clone(), config)?;

    // One-step setup: registers the seeded Support role.
    let role = runtime.service().quick_setup(GUILD, ADMIN).await?;
    info!(?role, "Quick setup finished");

    // A reaper outside the runtime's own loop backs the manual `sweep`
    // command; it shares the service and therefore all locking.
    let reaper = IdleReaper::new(runtime.service().clone());

    // -----------------------------------------------------------------------
    // 5. Run the console until EOF or Ctrl+C
    // -----------------------------------------------------------------------
    let mut console = repl::Repl::new(runtime, reaper, platform, GUILD, lobby, users);
    console.print_banner();

    tokio::select! {
        result = console.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    console.into_runtime().shutdown().await;
    Ok(())
}

/// One community, a handful of members, a support role and an admin.
fn seed_world(platform: &MemoryPlatform) -> Vec<(String, UserId)> {
    platform.add_guild(GUILD, "Sandbox Community");
    platform.add_role(GUILD, SUPPORT_ROLE, "Support");

    let users = vec![
        ("guichet".to_string(), MemoryPlatform::IDENTITY),
        ("root".to_string(), ADMIN),
        ("mara".to_string(), UserId(20)),
        ("nico".to_string(), UserId(21)),
        ("alice".to_string(), UserId(10)),
        ("bob".to_string(), UserId(11)),
    ];
    platform.add_member(GUILD, MemoryPlatform::IDENTITY, "Guichet", &[]);
    platform.add_member(GUILD, ADMIN, "root", &[]);
    platform.make_admin(GUILD, ADMIN);
    platform.add_member(GUILD, UserId(20), "mara", &[SUPPORT_ROLE]);
    platform.add_member(GUILD, UserId(21), "nico", &[SUPPORT_ROLE]);
    platform.add_member(GUILD, UserId(10), "alice", &[]);
    platform.add_member(GUILD, UserId(11), "bob", &[]);
    users
}
