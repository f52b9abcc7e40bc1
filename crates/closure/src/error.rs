use std::fmt;

pub type Result<T> = std::result::Result<T, CloseError>;

/// Where in the workflow a failure happened.
///
/// Ordered: everything after [`ClosureStage::Commit`] runs with the ticket
/// already closed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClosureStage {
    Resolve,
    Authorize,
    Transcript,
    Commit,
    Finalize,
    Notify,
}

impl ClosureStage {
    #[must_use]
    pub fn is_committed(self) -> bool {
        self > Self::Commit
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Authorize => "authorize",
            Self::Transcript => "transcript",
            Self::Commit => "commit",
            Self::Finalize => "finalize",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for ClosureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CloseError {
    /// Neither a tracked ticket nor a channel in an allowed category.
    #[error("this channel is not a ticket channel")]
    NotATicketChannel,

    #[error("you do not have permission to close this ticket")]
    NoPermission,

    /// The bot lost access to the ticket channel.
    #[error("access to the ticket channel was denied during {stage}")]
    ChannelAccessDenied {
        stage: ClosureStage,
        #[source]
        source: tickets_channels::Error,
    },

    #[error("store failure during {stage}: {source}")]
    Store {
        stage: ClosureStage,
        #[source]
        source: tickets_store::Error,
    },

    #[error("gateway failure during {stage}: {source}")]
    Gateway {
        stage: ClosureStage,
        #[source]
        source: tickets_channels::Error,
    },

    #[error("archive failure during {stage}: {source}")]
    Archive {
        stage: ClosureStage,
        #[source]
        source: tickets_archive::Error,
    },
}

impl CloseError {
    #[must_use]
    pub fn store(stage: ClosureStage, source: tickets_store::Error) -> Self {
        Self::Store { stage, source }
    }

    #[must_use]
    pub fn gateway(stage: ClosureStage, source: tickets_channels::Error) -> Self {
        Self::Gateway { stage, source }
    }

    #[must_use]
    pub fn archive(stage: ClosureStage, source: tickets_archive::Error) -> Self {
        Self::Archive { stage, source }
    }

    #[must_use]
    pub fn access_denied(stage: ClosureStage, source: tickets_channels::Error) -> Self {
        Self::ChannelAccessDenied { stage, source }
    }

    /// `None` for user errors, which happen before anything is touched.
    #[must_use]
    pub fn stage(&self) -> Option<ClosureStage> {
        match self {
            Self::NotATicketChannel | Self::NoPermission => None,
            Self::ChannelAccessDenied { stage, .. }
            | Self::Store { stage, .. }
            | Self::Gateway { stage, .. }
            | Self::Archive { stage, .. } => Some(*stage),
        }
    }

    /// Whether the ticket was already closed in the store when this error
    /// occurred. Callers must not retry such failures as a fresh closure.
    #[must_use]
    pub fn ticket_closed(&self) -> bool {
        self.stage().is_some_and(ClosureStage::is_committed)
    }

    /// Errors meant to be shown to the requester as-is.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::NotATicketChannel | Self::NoPermission)
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotATicketChannel => "not_a_ticket_channel",
            Self::NoPermission => "no_permission",
            Self::ChannelAccessDenied { .. } => "channel_access_denied",
            Self::Store { .. } => "store",
            Self::Gateway { .. } => "gateway",
            Self::Archive { .. } => "archive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_stages() {
        assert!(!ClosureStage::Commit.is_committed());
        assert!(ClosureStage::Finalize.is_committed());
        assert!(ClosureStage::Notify.is_committed());

        let before = CloseError::gateway(
            ClosureStage::Transcript,
            tickets_channels::Error::not_found("get messages"),
        );
        assert!(!before.ticket_closed());

        let after = CloseError::gateway(
            ClosureStage::Notify,
            tickets_channels::Error::not_found("create message"),
        );
        assert!(after.ticket_closed());
        assert!(!CloseError::NoPermission.ticket_closed());
        assert!(CloseError::NoPermission.is_user_error());
    }
}
