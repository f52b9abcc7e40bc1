//! Scoped autoclose exclusion.

use std::sync::Arc;

use {
    tickets_common::{GuildId, TicketId},
    tickets_store::TicketStore,
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use tickets_metrics::{closure as closure_metrics, counter};

/// Marks a ticket as excluded from automatic closure unless the closure
/// attempt reaches its commit point.
///
/// Call [`ExclusionGuard::commit`] once the ticket is closed in the store and
/// [`ExclusionGuard::settle`] on the way out. A guard dropped while still
/// armed (the attempt was cancelled or panicked) spawns the exclusion write on
/// the current runtime instead.
pub struct ExclusionGuard {
    store: Arc<dyn TicketStore>,
    guild_id: GuildId,
    ticket_id: TicketId,
    armed: bool,
}

impl ExclusionGuard {
    #[must_use]
    pub fn arm(store: Arc<dyn TicketStore>, guild_id: GuildId, ticket_id: TicketId) -> Self {
        Self {
            store,
            guild_id,
            ticket_id,
            armed: true,
        }
    }

    /// The attempt succeeded (or another attempt closed the ticket); nothing
    /// to compensate.
    pub fn commit(&mut self) {
        self.armed = false;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Run the compensating write if still armed. Errors are logged.
    pub async fn settle(mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        exclude(self.store.clone(), self.guild_id, self.ticket_id).await;
    }
}

impl Drop for ExclusionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (store, guild_id, ticket_id) = (self.store.clone(), self.guild_id, self.ticket_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%guild_id, %ticket_id, "closure abandoned, excluding ticket in background");
                handle.spawn(exclude(store, guild_id, ticket_id));
            },
            Err(_) => {
                warn!(%guild_id, %ticket_id, "closure abandoned outside a runtime, exclusion not recorded");
            },
        }
    }
}

async fn exclude(store: Arc<dyn TicketStore>, guild_id: GuildId, ticket_id: TicketId) {
    match store.exclude_from_autoclose(guild_id, ticket_id).await {
        Ok(()) => {
            debug!(%guild_id, %ticket_id, "ticket excluded from autoclose");
            #[cfg(feature = "metrics")]
            counter!(closure_metrics::AUTOCLOSE_EXCLUSIONS_TOTAL, "scope" => "ticket").increment(1);
        },
        Err(e) => error!(%guild_id, %ticket_id, error = %e, "failed to exclude ticket from autoclose"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tickets_store::store_memory::InMemoryTicketStore};

    const GUILD: GuildId = GuildId::new(1);
    const TICKET: TicketId = TicketId::new(2);

    #[tokio::test]
    async fn settle_excludes_when_armed() {
        let store = Arc::new(InMemoryTicketStore::new());
        let guard = ExclusionGuard::arm(store.clone(), GUILD, TICKET);
        guard.settle().await;
        assert!(store.is_excluded_from_autoclose(GUILD, TICKET).await.unwrap());
    }

    #[tokio::test]
    async fn commit_disarms() {
        let store = Arc::new(InMemoryTicketStore::new());
        let mut guard = ExclusionGuard::arm(store.clone(), GUILD, TICKET);
        guard.commit();
        assert!(!guard.is_armed());
        guard.settle().await;
        assert!(!store.is_excluded_from_autoclose(GUILD, TICKET).await.unwrap());
    }

    #[tokio::test]
    async fn drop_while_armed_spawns_exclusion() {
        let store = Arc::new(InMemoryTicketStore::new());
        drop(ExclusionGuard::arm(store.clone(), GUILD, TICKET));

        for _ in 0..50 {
            if store.is_excluded_from_autoclose(GUILD, TICKET).await.unwrap() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("exclusion was not recorded after drop");
    }
}
