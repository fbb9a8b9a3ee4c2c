//! Data carried across the platform seam.
//!
//! These are plain values: the core builds them, the platform adapter turns
//! them into whatever its gateway library wants.

use chrono::{DateTime, Utc};

use guichet_shared::{MessageId, PanelStyle, RoleId, UserId};

// ----------------------------------------------------------------
// Access control
// ----------------------------------------------------------------

/// Who an access overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
    /// The community's default role.
    Everyone,
    User(UserId),
    Role(RoleId),
}

/// Permission level granted to an overwrite target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No visibility.
    Denied,
    /// Read, write, attach files.
    Participant,
    /// Participant plus message moderation.
    Moderator,
    /// Moderator plus channel management (the system identity).
    Manager,
}

/// One entry of a channel's permission overwrite list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOverwrite {
    pub target: OverwriteTarget,
    pub access: Access,
}

impl AccessOverwrite {
    pub fn new(target: OverwriteTarget, access: Access) -> Self {
        Self { target, access }
    }
}

// ----------------------------------------------------------------
// Outbound messages
// ----------------------------------------------------------------

/// A rich embed. Fields mirror what every major chat platform renders.
#[derive(Debug, Clone, Default)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Accent color, 0xRRGGBB.
    pub color: Option<u32>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Embed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// One selectable category on a panel.
#[derive(Debug, Clone)]
pub struct PanelOption {
    pub label: String,
    pub emoji: String,
    pub description: String,
}

/// Interactive category-selection content attached to a panel message.
///
/// The core never touches UI widgets; the adapter renders this data as
/// buttons or a dropdown and reports selections back by calling into the
/// core's entry points.
#[derive(Debug, Clone)]
pub struct PanelContent {
    pub style: PanelStyle,
    pub options: Vec<PanelOption>,
}

/// An in-memory file handed to the platform for upload.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// A message handed to the platform for delivery.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    /// Plain content rendered above any embed; mentions live here.
    pub content: Option<String>,
    pub embed: Option<Embed>,
    /// Present on panel messages.
    pub panel: Option<PanelContent>,
    pub attachment: Option<Attachment>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }
}

// ----------------------------------------------------------------
// History
// ----------------------------------------------------------------

/// One message from a channel's history.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub id: MessageId,
    pub author: UserId,
    /// Author display name at fetch time.
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordering of a history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    OldestFirst,
    NewestFirst,
}
