use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Permission tier of a guild member, lowest first.
///
/// Ordering is meaningful: `Support > Everyone` and `Admin > Support`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Ordinary user.
    #[default]
    Everyone,
    Support,
    Admin,
}

impl PermissionLevel {
    /// Whether this tier counts as staff.
    #[must_use]
    pub fn is_staff(self) -> bool {
        self > Self::Everyone
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Everyone => write!(f, "everyone"),
            Self::Support => write!(f, "support"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for PermissionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "everyone" => Ok(Self::Everyone),
            "support" => Ok(Self::Support),
            "admin" => Ok(Self::Admin),
            other => Err(Error::UnknownPermissionLevel {
                value: other.to_string(),
            }),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(PermissionLevel::Admin > PermissionLevel::Support);
        assert!(PermissionLevel::Support > PermissionLevel::Everyone);
        assert!(!PermissionLevel::Everyone.is_staff());
        assert!(PermissionLevel::Support.is_staff());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "Admin".parse::<PermissionLevel>().unwrap(),
            PermissionLevel::Admin
        );
        assert!("moderator".parse::<PermissionLevel>().is_err());
    }
}
