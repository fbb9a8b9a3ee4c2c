//! Outbound message construction.
//!
//! Pure builders, one per user-visible notification. Keeping them out of the
//! service makes the copy easy to review in one place and trivial to test.

use chrono::Utc;

use guichet_platform::{Embed, OutboundMessage, PanelContent, PanelOption};
use guichet_shared::{naming, PanelStyle, UserId};
use guichet_store::{Category, GuildSettings, Ticket};

/// Color of the inactivity warning embed.
const WARNING_COLOR: u32 = 0x00f3_9c12;
/// Color of the auto-close notice embed.
const CLOSE_COLOR: u32 = 0x00e7_4c3c;

/// Staff mention line posted with the welcome message, if any.
///
/// An explicit ping role wins; otherwise up to three support roles are
/// mentioned so a misconfigured community cannot flood the channel.
pub fn ping_content(settings: &GuildSettings) -> Option<String> {
    if !settings.ping_on_create {
        return None;
    }
    if let Some(role) = settings.ping_role {
        return Some(role.mention());
    }
    if settings.support_roles.is_empty() {
        return None;
    }
    let mentions: Vec<String> = settings
        .support_roles
        .iter()
        .take(3)
        .map(|r| r.mention())
        .collect();
    Some(mentions.join(" "))
}

/// First message of a fresh ticket channel.
pub fn welcome_message(
    settings: &GuildSettings,
    category: &Category,
    ticket: &Ticket,
    ping: Option<String>,
) -> OutboundMessage {
    let text = naming::welcome_text(
        &settings.welcome_message,
        &ticket.requester.mention(),
        ticket.number,
        &ticket.category,
    );
    let mut embed = Embed::new(format!("🎫 Ticket #{}", ticket.number))
        .description(text)
        .color(category.color)
        .timestamp(ticket.created_at);
    if settings.show_user_info {
        embed = embed
            .field("Requester", ticket.requester.mention(), true)
            .field(
                "Category",
                format!("{} {}", category.emoji, ticket.category),
                true,
            );
    }
    OutboundMessage {
        content: ping,
        embed: Some(embed),
        ..Default::default()
    }
}

/// Direct message sent to the requester right after creation.
pub fn created_dm(guild_name: &str, ticket: &Ticket, color: u32) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("🎫 Ticket created")
            .description(format!(
                "Your ticket #{} in {} is open: {}",
                ticket.number,
                guild_name,
                ticket.channel.mention()
            ))
            .color(color)
            .timestamp(Utc::now()),
    )
}

/// Posted in the ticket channel when a staff member claims it.
pub fn claim_announcement(claimer: UserId, color: u32) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("🙋 Ticket claimed")
            .description(format!("{} is handling this ticket.", claimer.mention()))
            .color(color)
            .timestamp(Utc::now()),
    )
}

/// Direct message telling the requester who picked their ticket up.
pub fn claim_dm(guild_name: &str, number: u64, claimer: UserId, color: u32) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("🙋 Ticket claimed")
            .description(format!(
                "Your ticket #{number} in {guild_name} was claimed by {}.",
                claimer.mention()
            ))
            .color(color)
            .timestamp(Utc::now()),
    )
}

/// Direct message asking the requester for a rating after close.
pub fn feedback_prompt(guild_name: &str, ticket: &Ticket, color: u32) -> OutboundMessage {
    let reason = ticket.close_reason.as_deref().unwrap_or("no reason given");
    OutboundMessage::embed(
        Embed::new("🔒 Ticket closed")
            .description(format!(
                "Your ticket #{} in {guild_name} was closed ({reason}). \
                 How did we do? Rate the support from 1 to 5.",
                ticket.number
            ))
            .color(color)
            .timestamp(Utc::now()),
    )
}

/// Posted in the ticket channel once it enters the warning window.
pub fn idle_warning(hours_left: i64) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("⏰ Inactivity warning")
            .description(format!(
                "This ticket has seen no activity for a while. It will close \
                 automatically in about {hours_left} hour(s) unless someone writes here."
            ))
            .color(WARNING_COLOR)
            .timestamp(Utc::now()),
    )
}

/// Posted in the ticket channel right before an automatic close.
pub fn auto_close_notice(idle_hours: i64) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("🔒 Closed due to inactivity")
            .description(format!(
                "No activity for {idle_hours} hour(s); this ticket is now closed."
            ))
            .color(CLOSE_COLOR)
            .timestamp(Utc::now()),
    )
}

/// One line for the community's audit log channel.
pub fn audit_embed(text: &str, color: u32) -> OutboundMessage {
    OutboundMessage::embed(
        Embed::new("Ticket log")
            .description(text)
            .color(color)
            .timestamp(Utc::now()),
    )
}

/// The panel message itself: an embed listing the offered categories plus
/// the interactive component the host renders.
pub fn panel_message(
    title: &str,
    color: u32,
    style: PanelStyle,
    categories: &[(String, Category)],
) -> OutboundMessage {
    let lines: Vec<String> = categories
        .iter()
        .map(|(name, cat)| format!("{} **{}** {}", cat.emoji, name, cat.description))
        .collect();
    let embed = Embed::new(title)
        .description(lines.join("\n"))
        .color(color)
        .footer("Pick a category to open a ticket");
    let options = categories
        .iter()
        .map(|(name, cat)| PanelOption {
            label: name.clone(),
            emoji: cat.emoji.clone(),
            description: cat.description.clone(),
        })
        .collect();
    OutboundMessage {
        embed: Some(embed),
        panel: Some(PanelContent { style, options }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guichet_shared::RoleId;

    #[test]
    fn test_ping_prefers_explicit_role() {
        let mut settings = GuildSettings::default();
        settings.support_roles = vec![RoleId(1), RoleId(2)];
        settings.ping_role = Some(RoleId(9));
        assert_eq!(ping_content(&settings), Some("<@&9>".to_string()));
    }

    #[test]
    fn test_ping_caps_support_roles_at_three() {
        let mut settings = GuildSettings::default();
        settings.support_roles = vec![RoleId(1), RoleId(2), RoleId(3), RoleId(4)];
        assert_eq!(
            ping_content(&settings),
            Some("<@&1> <@&2> <@&3>".to_string())
        );
    }

    #[test]
    fn test_ping_silent_when_disabled_or_unconfigured() {
        let mut settings = GuildSettings::default();
        assert_eq!(ping_content(&settings), None);
        settings.support_roles = vec![RoleId(1)];
        settings.ping_on_create = false;
        assert_eq!(ping_content(&settings), None);
    }

    #[test]
    fn test_panel_message_lists_every_category() {
        let categories = vec![
            (
                "Support".to_string(),
                Category {
                    emoji: "🛠️".to_string(),
                    description: "Technical help".to_string(),
                    color: 0x00e7_4c3c,
                    enabled: true,
                },
            ),
            (
                "Report".to_string(),
                Category {
                    emoji: "⚠️".to_string(),
                    description: "Report a member".to_string(),
                    color: 0x00f3_9c12,
                    enabled: true,
                },
            ),
        ];
        let message = panel_message("Open a ticket", 0x0034_98db, PanelStyle::Dropdown, &categories);
        let embed = message.embed.expect("panel embed");
        assert!(embed.description.as_deref().unwrap().contains("**Support**"));
        assert!(embed.description.as_deref().unwrap().contains("**Report**"));
        let panel = message.panel.expect("panel content");
        assert_eq!(panel.style, PanelStyle::Dropdown);
        assert_eq!(panel.options.len(), 2);
        assert_eq!(panel.options[0].label, "Support");
    }
}
