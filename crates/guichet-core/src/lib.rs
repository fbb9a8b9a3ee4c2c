//! # guichet-core
//!
//! The ticket state machine and everything that drives it: lifecycle
//! operations, the administrative surface, panels, feedback capture,
//! transcripts, and the idle reaper. Persistence comes from
//! [`guichet_store`], all platform contact goes through the
//! [`guichet_platform::Platform`] trait, so the whole engine runs the same
//! against a live gateway or the in-process test double.

pub mod admin;
pub mod config;
pub mod effects;
pub mod error;
pub mod feedback;
pub mod messages;
pub mod panels;
pub mod reaper;
pub mod runtime;
pub mod service;
pub mod transcript;

pub use config::RuntimeConfig;
pub use error::{Result, TicketError};
pub use feedback::FeedbackCollector;
pub use panels::{PanelBinding, PanelRegistry};
pub use reaper::{IdleReaper, ReaperHandle};
pub use runtime::Runtime;
pub use service::{GuildStats, TicketService, UserStats};
pub use transcript::{Transcript, TranscriptExporter};
