//! Domain models persisted inside guild and user documents.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guichet_shared::{ChannelId, MessageId, PanelStyle, UserId};

use crate::settings::{self, GuildSettings};

// ----------------------------------------------------------------
// Tickets
// ----------------------------------------------------------------

/// Lifecycle state of a ticket. `Closed` is terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

/// One support request, bound 1:1 to its conversation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Number drawn from the per-community counter; unique, never reused.
    pub number: u64,
    /// The private conversation channel backing this ticket.
    pub channel: ChannelId,
    /// Who opened the ticket.
    pub requester: UserId,
    /// Category name at creation time; later catalog edits do not touch it.
    pub category: String,
    /// Current lifecycle state.
    pub status: TicketStatus,
    /// Staff member the ticket is assigned to, set at most once while open.
    pub claimed_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Close timestamp, set on the transition to `Closed`.
    pub closed_at: Option<DateTime<Utc>>,
    /// Free-form close reason.
    pub close_reason: Option<String>,
    /// Who closed the ticket (the system identity for auto-closes).
    pub closed_by: Option<UserId>,
    /// Whether the idle warning has already been delivered.
    pub warning_sent: bool,
}

impl Ticket {
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }
}

// ----------------------------------------------------------------
// Categories
// ----------------------------------------------------------------

/// A ticket category; the catalog is keyed by category name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Emoji shown on panels and welcome embeds.
    pub emoji: String,
    /// Short description shown on panels.
    pub description: String,
    /// Accent color for embeds created under this category, 0xRRGGBB.
    pub color: u32,
    /// Disabled categories are hidden from panels and refused at creation.
    pub enabled: bool,
}

// ----------------------------------------------------------------
// Panels
// ----------------------------------------------------------------

/// A persistent interactive placement offering category selection, keyed by
/// the message hosting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    /// Channel the panel message lives in.
    pub channel: ChannelId,
    /// Buttons or dropdown.
    pub style: PanelStyle,
    /// When the panel was published.
    pub created_at: DateTime<Utc>,
}

// ----------------------------------------------------------------
// Feedback
// ----------------------------------------------------------------

/// One post-close rating. Lives in the user document and therefore outlives
/// both the ticket record and the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Channel id of the rated ticket.
    pub ticket: ChannelId,
    /// Rating between 1 and 5 inclusive.
    pub rating: u8,
    /// Optional free-form comment.
    pub comment: Option<String>,
    /// When the rating was recorded.
    pub created_at: DateTime<Utc>,
}

// ----------------------------------------------------------------
// Documents
// ----------------------------------------------------------------

/// Everything one community owns, persisted as a single JSON document.
///
/// All fields are mutated together under the community's document lock, so
/// cross-field invariants (counter vs. tickets map) stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildDoc {
    /// Strictly increasing ticket number source. Issued values are never
    /// reused, but numbering is not gap-free.
    pub counter: u64,
    /// Per-community configuration.
    pub settings: GuildSettings,
    /// Category catalog keyed by name.
    pub categories: BTreeMap<String, Category>,
    /// Ticket records keyed by their channel id.
    pub tickets: BTreeMap<ChannelId, Ticket>,
    /// Panel records keyed by the message hosting the UI.
    pub panels: BTreeMap<MessageId, Panel>,
    /// Users barred from creating tickets.
    pub blacklist: BTreeSet<UserId>,
}

impl Default for GuildDoc {
    fn default() -> Self {
        Self {
            counter: 0,
            settings: GuildSettings::default(),
            categories: settings::default_categories(),
            tickets: BTreeMap::new(),
            panels: BTreeMap::new(),
            blacklist: BTreeSet::new(),
        }
    }
}

impl GuildDoc {
    /// Iterate over open tickets.
    pub fn open_tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values().filter(|t| t.is_open())
    }

    /// Number of tickets a user currently holds open.
    pub fn open_ticket_count(&self, user: UserId) -> usize {
        self.open_tickets().filter(|t| t.requester == user).count()
    }
}

/// Per-user state: the append-only feedback history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDoc {
    pub feedback: Vec<FeedbackEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_ticket(number: u64, channel: u64, requester: u64) -> Ticket {
        Ticket {
            number,
            channel: ChannelId(channel),
            requester: UserId(requester),
            category: "General".to_string(),
            status: TicketStatus::Open,
            claimed_by: None,
            created_at: Utc::now(),
            closed_at: None,
            close_reason: None,
            closed_by: None,
            warning_sent: false,
        }
    }

    #[test]
    fn default_doc_carries_the_category_catalog() {
        let doc = GuildDoc::default();
        assert_eq!(doc.counter, 0);
        assert_eq!(doc.categories.len(), 5);
        assert!(doc.categories.values().all(|c| c.enabled));
        assert!(doc.categories.contains_key(&doc.settings.default_category));
    }

    #[test]
    fn open_ticket_count_ignores_closed_and_other_users() {
        let mut doc = GuildDoc::default();
        doc.tickets.insert(ChannelId(1), open_ticket(1, 1, 10));
        doc.tickets.insert(ChannelId(2), open_ticket(2, 2, 10));
        doc.tickets.insert(ChannelId(3), open_ticket(3, 3, 11));

        let mut closed = open_ticket(4, 4, 10);
        closed.status = TicketStatus::Closed;
        doc.tickets.insert(ChannelId(4), closed);

        assert_eq!(doc.open_ticket_count(UserId(10)), 2);
        assert_eq!(doc.open_ticket_count(UserId(11)), 1);
        assert_eq!(doc.open_ticket_count(UserId(12)), 0);
    }

    #[test]
    fn guild_doc_round_trips_through_json() {
        let mut doc = GuildDoc::default();
        doc.counter = 9;
        doc.tickets.insert(ChannelId(42), open_ticket(9, 42, 7));
        doc.blacklist.insert(UserId(13));

        let json = serde_json::to_string(&doc).unwrap();
        let back: GuildDoc = serde_json::from_str(&json).unwrap();

        assert_eq!(back.counter, 9);
        assert_eq!(back.tickets.len(), 1);
        assert_eq!(back.tickets[&ChannelId(42)].requester, UserId(7));
        assert!(back.blacklist.contains(&UserId(13)));
    }
}
