//! Strongly typed identifiers.
//!
//! Platform ids are 64-bit snowflakes; ticket ids are sequential per guild.
//! Keeping them distinct types stops a channel id from being passed where a
//! user id is expected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::Error;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(SnowflakeVisitor).map(Self)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| Error::invalid_id(s))
            }
        }
    };
}

/// Accepts both numeric and string encodings. Platform APIs send snowflakes
/// as strings because they overflow JavaScript numbers.
struct SnowflakeVisitor;

impl de::Visitor<'_> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a snowflake as an unsigned integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative snowflake: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        v.trim()
            .parse::<u64>()
            .map_err(|_| E::custom(format!("invalid snowflake: {v}")))
    }
}

id_type!(
    /// A guild (server) id.
    GuildId
);
id_type!(
    /// A channel, thread or category id.
    ChannelId
);
id_type!(
    /// A user id.
    UserId
);
id_type!(
    /// A message id. Ids increase monotonically with creation time.
    MessageId
);
id_type!(RoleId);
id_type!(
    /// A ticket number, unique within its guild.
    TicketId
);

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snowflake() {
        let id: ChannelId = "1176986720772833421".parse().unwrap();
        assert_eq!(id.get(), 1176986720772833421);
        assert_eq!(id.to_string(), "1176986720772833421");
    }

    #[test]
    fn rejects_garbage() {
        let err = "not-a-number".parse::<UserId>().unwrap_err();
        assert!(err.to_string().contains("not-a-number"));
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&TicketId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: TicketId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TicketId::new(42));
    }

    #[test]
    fn deserializes_string_snowflake() {
        let id: MessageId = serde_json::from_str("\"1250633639545536523\"").unwrap();
        assert_eq!(id.get(), 1250633639545536523);
        assert!(serde_json::from_str::<MessageId>("-4").is_err());
    }

    #[test]
    fn message_ids_order_by_value() {
        assert!(MessageId::new(10) < MessageId::new(11));
    }
}
