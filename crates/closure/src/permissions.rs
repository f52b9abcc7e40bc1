//! Who may close a ticket.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tickets_channels::{ChannelGateway, Member, Result},
    tickets_common::{GuildId, PermissionLevel, RoleId, UserId},
    tickets_config::GuildSettings,
    tickets_store::Ticket,
};

#[async_trait]
pub trait PermissionCheck: Send + Sync {
    /// Tier of a guild member. `None` means the user is not (or no longer) a
    /// member and gets the lowest tier.
    async fn permission_level(
        &self,
        settings: &GuildSettings,
        member: Option<&Member>,
    ) -> Result<PermissionLevel>;

    /// Whether `requester` may close `ticket`. `None` is a channel in an
    /// allowed category with no ticket record.
    async fn can_close(
        &self,
        settings: &GuildSettings,
        guild_id: GuildId,
        requester: UserId,
        ticket: Option<&Ticket>,
    ) -> Result<bool>;
}

/// Tiers from the configured admin/support user and role lists.
///
/// The opener may always close their own ticket; otherwise support staff or
/// above is required.
pub struct RolePermissions {
    gateway: Arc<dyn ChannelGateway>,
}

impl RolePermissions {
    pub fn new(gateway: Arc<dyn ChannelGateway>) -> Self {
        Self { gateway }
    }

    #[must_use]
    pub fn level_of(settings: &GuildSettings, member: &Member) -> PermissionLevel {
        let user = member.user.id;
        let has_role = |roles: &[RoleId]| member.roles.iter().any(|r| roles.contains(r));

        if settings.admin_users.contains(&user) || has_role(&settings.admin_roles) {
            PermissionLevel::Admin
        } else if settings.support_users.contains(&user) || has_role(&settings.support_roles) {
            PermissionLevel::Support
        } else {
            PermissionLevel::Everyone
        }
    }

    /// Look up `user_id` and compute their tier. A missing member is
    /// `Everyone`.
    pub async fn level_of_user(
        &self,
        settings: &GuildSettings,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<PermissionLevel> {
        match self.gateway.get_guild_member(guild_id, user_id).await {
            Ok(member) => Ok(Self::level_of(settings, &member)),
            Err(e) if e.is_not_found() => Ok(PermissionLevel::Everyone),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl PermissionCheck for RolePermissions {
    async fn permission_level(
        &self,
        settings: &GuildSettings,
        member: Option<&Member>,
    ) -> Result<PermissionLevel> {
        Ok(member.map_or(PermissionLevel::Everyone, |m| Self::level_of(settings, m)))
    }

    async fn can_close(
        &self,
        settings: &GuildSettings,
        guild_id: GuildId,
        requester: UserId,
        ticket: Option<&Ticket>,
    ) -> Result<bool> {
        if ticket.is_some_and(|t| t.user_id == requester) {
            return Ok(true);
        }
        Ok(self
            .level_of_user(settings, guild_id, requester)
            .await?
            .is_staff())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{RecordingGateway, member},
        chrono::Utc,
        rstest::rstest,
        tickets_common::{ChannelId, TicketId},
    };

    const GUILD: GuildId = GuildId::new(5);

    fn settings() -> GuildSettings {
        GuildSettings {
            admin_users: vec![UserId::new(1)],
            admin_roles: vec![RoleId::new(100)],
            support_roles: vec![RoleId::new(200)],
            ..Default::default()
        }
    }

    #[rstest]
    #[case::admin_user(1, vec![], PermissionLevel::Admin)]
    #[case::admin_role(2, vec![100], PermissionLevel::Admin)]
    #[case::support_role(3, vec![200, 999], PermissionLevel::Support)]
    #[case::nobody(4, vec![999], PermissionLevel::Everyone)]
    fn tiers_from_settings(#[case] user: u64, #[case] roles: Vec<u64>, #[case] expected: PermissionLevel) {
        let m = member(user, &roles);
        assert_eq!(RolePermissions::level_of(&settings(), &m), expected);
    }

    #[tokio::test]
    async fn opener_and_staff_can_close() {
        let gateway = Arc::new(RecordingGateway::new());
        gateway.add_member(member(3, &[200]));
        gateway.add_member(member(9, &[]));
        let permissions = RolePermissions::new(gateway.clone());
        let ticket = Ticket::new(GUILD, TicketId::new(1), ChannelId::new(10), UserId::new(7), Utc::now());

        // Opener, even without a member record.
        assert!(permissions.can_close(&settings(), GUILD, UserId::new(7), Some(&ticket)).await.unwrap());
        // Support via role.
        assert!(permissions.can_close(&settings(), GUILD, UserId::new(3), Some(&ticket)).await.unwrap());
        // Ordinary member.
        assert!(!permissions.can_close(&settings(), GUILD, UserId::new(9), Some(&ticket)).await.unwrap());
        // Untracked channel: staff only, unknown user is Everyone.
        assert!(!permissions.can_close(&settings(), GUILD, UserId::new(7), None).await.unwrap());
    }
}
