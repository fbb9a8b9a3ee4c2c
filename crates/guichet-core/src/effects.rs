//! Best-effort side effects.
//!
//! Lifecycle operations must not fail because a courtesy notification could
//! not be delivered. Results routed through [`best_effort`] are consumed,
//! with every suppressed failure logged so it stays visible to operators.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use guichet_platform::{Platform, PlatformError};
use guichet_shared::{ChannelId, GuildId};

/// Consume a best-effort result, logging the failure it may carry.
pub fn best_effort<T>(context: &'static str, result: Result<T, PlatformError>) {
    if let Err(e) = result {
        warn!(context, error = %e, "best-effort side effect failed");
    }
}

/// Delete a channel after a grace delay, off the caller's path.
///
/// The delay gives participants a moment to read the closing notice. The
/// deletion itself is best-effort; a channel already gone is not an error
/// worth surfacing.
pub fn schedule_channel_deletion(
    platform: Arc<dyn Platform>,
    guild: GuildId,
    channel: ChannelId,
    grace: Duration,
    reason: String,
) {
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        debug!(channel_id = %channel, "deleting ticket channel after grace delay");
        best_effort(
            "ticket channel deletion",
            platform.delete_channel(guild, channel, &reason).await,
        );
    });
}
