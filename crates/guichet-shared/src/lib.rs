//! # guichet-shared
//!
//! Platform-independent building blocks shared by every Guichet crate:
//! the snowflake identifier newtypes and the string templating used to
//! derive ticket channel names and welcome messages.

pub mod naming;
pub mod types;

pub use types::{ChannelId, GuildId, MessageId, PanelStyle, RoleId, UserId};
