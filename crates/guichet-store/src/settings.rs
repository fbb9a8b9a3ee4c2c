//! Versioned per-community configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use guichet_shared::{ChannelId, RoleId};

use crate::models::Category;

/// Settings schema version written into every persisted document.
pub const SETTINGS_VERSION: u32 = 1;

/// Per-community configuration, stored inside the guild document.
///
/// Every field carries a serde default so documents written by older
/// versions keep loading; [`GuildSettings::normalize`] repairs out-of-range
/// values on load instead of refusing the whole community.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildSettings {
    /// Settings schema version, checked on load.
    pub schema_version: u32,
    /// Parent channel (platform category) new ticket channels are filed under.
    pub parent_channel: Option<ChannelId>,
    /// Roles whose members triage tickets.
    pub support_roles: Vec<RoleId>,
    /// Roles whose members administer the ticket system.
    pub admin_roles: Vec<RoleId>,
    /// Most tickets a single user may hold open at once. At least 1.
    pub ticket_limit: u32,
    /// Category used when a creation request names none.
    pub default_category: String,
    /// Welcome template; supports `{user}`, `{ticket_id}` and `{category}`.
    pub welcome_message: String,
    /// Channel receiving audit log events, if any.
    pub log_channel: Option<ChannelId>,
    /// Whether a rating is requested from the requester after close.
    pub feedback_enabled: bool,
    /// Hours of inactivity before a ticket auto-closes; 0 disables the reaper
    /// for this community.
    pub auto_close_hours: u32,
    /// Hours before the auto-close threshold at which the warning is sent.
    pub auto_close_warning_hours: u32,
    /// Whether staff may claim tickets.
    pub claim_enabled: bool,
    /// Channel name template; supports `{counter}`, `{user}` and `{category}`.
    pub ticket_name_format: String,
    /// DM the requester when their ticket is claimed.
    pub notify_on_claim: bool,
    /// DM the requester when their ticket is created.
    pub dm_notifications: bool,
    /// Accent color for embeds without a category color, 0xRRGGBB.
    pub embed_color: u32,
    /// Include requester account details in the welcome embed.
    pub show_user_info: bool,
    /// Mention staff in the welcome message.
    pub ping_on_create: bool,
    /// Role mentioned on creation instead of the support roles, if set.
    pub ping_role: Option<RoleId>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_VERSION,
            parent_channel: None,
            support_roles: Vec::new(),
            admin_roles: Vec::new(),
            ticket_limit: 3,
            default_category: "General".to_string(),
            welcome_message:
                "Welcome {user}! A staff member will take care of your request shortly."
                    .to_string(),
            log_channel: None,
            feedback_enabled: true,
            auto_close_hours: 72,
            auto_close_warning_hours: 24,
            claim_enabled: true,
            ticket_name_format: "ticket-{counter}".to_string(),
            notify_on_claim: true,
            dm_notifications: true,
            embed_color: 0x3498db,
            show_user_info: true,
            ping_on_create: true,
            ping_role: None,
        }
    }
}

impl GuildSettings {
    /// Repair out-of-range values, logging each fix.
    ///
    /// Called on every document load. Setters keep values valid at write
    /// time; this guards against hand-edited or out-of-date documents.
    pub fn normalize(&mut self) {
        if self.schema_version > SETTINGS_VERSION {
            tracing::warn!(
                stored = self.schema_version,
                supported = SETTINGS_VERSION,
                "settings written by a newer version; unknown fields were dropped"
            );
            self.schema_version = SETTINGS_VERSION;
        }

        if self.ticket_limit == 0 {
            tracing::warn!("ticket_limit 0 is invalid, raising to 1");
            self.ticket_limit = 1;
        }

        if self.auto_close_hours > 0 && self.auto_close_warning_hours > self.auto_close_hours {
            tracing::warn!(
                warning = self.auto_close_warning_hours,
                threshold = self.auto_close_hours,
                "warning window exceeds the auto-close threshold, clamping"
            );
            self.auto_close_warning_hours = self.auto_close_hours;
        }

        if self.ticket_name_format.trim().is_empty() {
            tracing::warn!("empty ticket_name_format, restoring the default");
            self.ticket_name_format = Self::default().ticket_name_format;
        }

        if self.default_category.trim().is_empty() {
            tracing::warn!("empty default_category, restoring the default");
            self.default_category = Self::default().default_category;
        }
    }
}

/// Default category catalog seeded into fresh communities.
pub fn default_categories() -> BTreeMap<String, Category> {
    let mut catalog = BTreeMap::new();
    catalog.insert(
        "General".to_string(),
        Category {
            emoji: "🎫".to_string(),
            description: "General questions and requests".to_string(),
            color: 0x3498db,
            enabled: true,
        },
    );
    catalog.insert(
        "Support".to_string(),
        Category {
            emoji: "🛠️".to_string(),
            description: "Technical help with the platform".to_string(),
            color: 0xe74c3c,
            enabled: true,
        },
    );
    catalog.insert(
        "Report".to_string(),
        Category {
            emoji: "⚠️".to_string(),
            description: "Report a member or an incident".to_string(),
            color: 0xf39c12,
            enabled: true,
        },
    );
    catalog.insert(
        "Application".to_string(),
        Category {
            emoji: "📝".to_string(),
            description: "Apply to join the team".to_string(),
            color: 0x9b59b6,
            enabled: true,
        },
    );
    catalog.insert(
        "Partnership".to_string(),
        Category {
            emoji: "🤝".to_string(),
            description: "Partnership and cooperation inquiries".to_string(),
            color: 0x1abc9c,
            enabled: true,
        },
    );
    catalog
}
