use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Snowflake ids are serialized as strings: the host platform transports them
// that way, and JSON object keys must be strings anyway.
macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct IdVisitor;

                impl<'de> Visitor<'de> for IdVisitor {
                    type Value = u64;

                    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("a snowflake id as a string or integer")
                    }

                    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
                        Ok(v)
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
                        v.parse().map_err(de::Error::custom)
                    }
                }

                deserializer.deserialize_any(IdVisitor).map($name)
            }
        }
    };
}

snowflake_id!(
    /// A community (guild) on the host platform.
    GuildId
);

snowflake_id!(
    /// A conversation channel. Ticket records are keyed by this.
    ChannelId
);

snowflake_id!(
    /// A member of the platform, requester or staff alike.
    UserId
);

snowflake_id!(
    /// A role granting staff or admin standing within a community.
    RoleId
);

snowflake_id!(
    /// A single message; panel records are keyed by the message hosting them.
    MessageId
);

impl UserId {
    /// Platform mention markup for this user.
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Platform mention markup for this role.
    pub fn mention(self) -> String {
        format!("<@&{}>", self.0)
    }
}

impl ChannelId {
    /// Platform mention markup for this channel.
    pub fn mention(self) -> String {
        format!("<#{}>", self.0)
    }
}

/// Presentation style of a ticket panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelStyle {
    Buttons,
    Dropdown,
}

impl fmt::Display for PanelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buttons => f.write_str("buttons"),
            Self::Dropdown => f.write_str("dropdown"),
        }
    }
}

impl FromStr for PanelStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buttons" => Ok(Self::Buttons),
            "dropdown" => Ok(Self::Dropdown),
            _ => Err(()),
        }
    }
}
