//! Plain-text transcripts of ticket channels.
//!
//! The export walks the full channel history oldest first and renders one
//! line per message. Deliberately plain text: it survives any viewer and
//! diffs cleanly in an archive.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use guichet_platform::{Attachment, HistoryOrder, OutboundMessage, Platform, PlatformError};
use guichet_shared::{ChannelId, GuildId};

use crate::error::{Result, TicketError};

/// Timestamp format used in transcript headers and message lines.
const TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// A rendered transcript, ready to be posted or written to disk.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub file_name: String,
    pub content: String,
    pub message_count: usize,
}

pub struct TranscriptExporter {
    platform: Arc<dyn Platform>,
}

impl TranscriptExporter {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    /// Render the channel's history. Empty channels yield `NoMessages`;
    /// a vanished channel yields `ChannelNotFound`.
    pub async fn export(&self, guild: GuildId, channel: ChannelId) -> Result<Transcript> {
        let history = self
            .platform
            .fetch_history(channel, None, HistoryOrder::OldestFirst)
            .await
            .map_err(missing_channel)?;
        if history.is_empty() {
            return Err(TicketError::NoMessages);
        }
        let channel_name = self
            .platform
            .channel_name(channel)
            .await
            .map_err(missing_channel)?;
        let guild_name = match self.platform.guild_name(guild).await {
            Ok(name) => name,
            Err(_) => guild.to_string(),
        };

        let mut lines = vec![
            format!("Ticket transcript - {channel_name}"),
            format!("Community: {guild_name}"),
            format!("Exported: {}", Utc::now().format(TIME_FORMAT)),
            "=".repeat(50),
            String::new(),
        ];
        for message in &history {
            let content = if message.content.is_empty() {
                "[no content]"
            } else {
                message.content.as_str()
            };
            lines.push(format!(
                "[{}] {}: {}",
                message.timestamp.format(TIME_FORMAT),
                message.author_name,
                content
            ));
        }

        info!(channel_id = %channel, messages = history.len(), "transcript exported");
        Ok(Transcript {
            file_name: format!("transcript_{channel_name}.txt"),
            content: lines.join("\n"),
            message_count: history.len(),
        })
    }

    /// Export the channel and post the transcript back into it as a file.
    pub async fn post(&self, guild: GuildId, channel: ChannelId) -> Result<Transcript> {
        let transcript = self.export(guild, channel).await?;
        let message = OutboundMessage {
            content: Some("📄 Ticket transcript".to_string()),
            attachment: Some(Attachment {
                file_name: transcript.file_name.clone(),
                data: transcript.content.clone().into_bytes(),
            }),
            ..Default::default()
        };
        self.platform.send_message(channel, message).await?;
        Ok(transcript)
    }
}

fn missing_channel(e: PlatformError) -> TicketError {
    match e {
        PlatformError::ChannelNotFound(_) => TicketError::ChannelNotFound,
        other => TicketError::Platform(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use guichet_platform::MemoryPlatform;
    use guichet_shared::UserId;

    const GUILD: GuildId = GuildId(100);
    const ALICE: UserId = UserId(10);
    const MARA: UserId = UserId(20);

    async fn setup() -> (TranscriptExporter, Arc<MemoryPlatform>, ChannelId) {
        let platform = Arc::new(MemoryPlatform::new());
        platform.add_guild(GUILD, "Test Community");
        platform.add_member(GUILD, ALICE, "alice", &[]);
        platform.add_member(GUILD, MARA, "mara", &[]);
        let channel = platform
            .create_channel(GUILD, "ticket-1", None, &[])
            .await
            .unwrap();
        (TranscriptExporter::new(platform.clone()), platform, channel)
    }

    #[tokio::test]
    async fn test_export_renders_header_and_messages_oldest_first() {
        let (exporter, platform, channel) = setup().await;
        let base = Utc::now() - Duration::hours(1);
        platform
            .say_at(channel, ALICE, "my payment failed", base)
            .unwrap();
        platform
            .say_at(channel, MARA, "looking into it", base + Duration::minutes(5))
            .unwrap();

        let transcript = exporter.export(GUILD, channel).await.unwrap();

        assert_eq!(transcript.file_name, "transcript_ticket-1.txt");
        assert_eq!(transcript.message_count, 2);
        let lines: Vec<&str> = transcript.content.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "Ticket transcript - ticket-1");
        assert_eq!(lines[1], "Community: Test Community");
        assert!(lines[2].starts_with("Exported: "));
        assert_eq!(lines[3], "=".repeat(50));
        assert_eq!(lines[4], "");
        assert!(lines[5].contains("alice: my payment failed"));
        assert!(lines[6].contains("mara: looking into it"));
    }

    #[tokio::test]
    async fn test_export_substitutes_empty_content() {
        let (exporter, platform, channel) = setup().await;
        platform.say(channel, ALICE, "").unwrap();

        let transcript = exporter.export(GUILD, channel).await.unwrap();
        assert!(transcript.content.ends_with("alice: [no content]"));
    }

    #[tokio::test]
    async fn test_export_refuses_empty_channels() {
        let (exporter, _platform, channel) = setup().await;
        let err = exporter.export(GUILD, channel).await;
        assert!(matches!(err, Err(TicketError::NoMessages)));
    }

    #[tokio::test]
    async fn test_export_reports_missing_channels() {
        let (exporter, _platform, _channel) = setup().await;
        let err = exporter.export(GUILD, ChannelId(9999)).await;
        assert!(matches!(err, Err(TicketError::ChannelNotFound)));
    }

    #[tokio::test]
    async fn test_post_attaches_the_rendered_file() {
        let (exporter, platform, channel) = setup().await;
        platform.say(channel, ALICE, "hello").unwrap();

        let transcript = exporter.post(GUILD, channel).await.unwrap();

        let sent = platform.sent_to(channel);
        assert_eq!(sent.len(), 1);
        let attachment = sent[0].attachment.as_ref().expect("transcript attachment");
        assert_eq!(attachment.file_name, transcript.file_name);
        assert_eq!(attachment.data, transcript.content.as_bytes());
    }
}
