//! Ticket closure and archival orchestration.
//!
//! [`ClosureCoordinator`] is the single entry point. It validates a request,
//! captures the transcript through [`TranscriptCollector`], commits the closed
//! state, finalizes the channel and hands off to [`ArchiveNotifier`]. An
//! [`ExclusionGuard`] keeps tickets whose closure failed before the commit out
//! of the automatic closure sweep.

pub mod coordinator;
pub mod error;
pub mod guard;
pub mod notifier;
pub mod permissions;
pub mod summary;
pub mod sweep;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    coordinator::{CloseOutcome, CloseRequest, CloseSource, ClosureCoordinator},
    error::{CloseError, ClosureStage, Result},
    guard::ExclusionGuard,
    notifier::{ArchiveNotifier, DirectNotification, NotifyError, NotifyRequest, NotifySummary},
    permissions::{PermissionCheck, RolePermissions},
    summary::{CloseSummary, SummaryElement},
    sweep::{AutocloseSweep, SweepReport},
    transcript::{Transcript, TranscriptCollector, TranscriptError},
};
