//! Active-run registry: at most one cancellation handle per category.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use account_hub_core::types::DbId;
use tokio_util::sync::CancellationToken;

struct ActiveRun {
    token: CancellationToken,
    /// Distinguishes this registration from a later one for the same category.
    ticket: u64,
}

/// Tracks the in-flight run of each category.
///
/// Registration hands out a [`RunGuard`]; dropping the guard removes the
/// entry, so a run that panics or errors still frees its slot.
#[derive(Default)]
pub struct RunRegistry {
    active: Mutex<HashMap<DbId, ActiveRun>>,
    next_ticket: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DbId, ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the category's slot. Returns `None` if a run is already active.
    pub fn try_register(self: &Arc<Self>, category_id: DbId) -> Option<RunGuard> {
        let mut active = self.lock();
        if active.contains_key(&category_id) {
            return None;
        }

        let token = CancellationToken::new();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        active.insert(
            category_id,
            ActiveRun {
                token: token.clone(),
                ticket,
            },
        );

        Some(RunGuard {
            registry: Arc::clone(self),
            category_id,
            ticket,
            token,
        })
    }

    /// Cancel the category's active run. Returns whether one was registered.
    pub fn stop(&self, category_id: DbId) -> bool {
        match self.lock().get(&category_id) {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, category_id: DbId) -> bool {
        self.lock().contains_key(&category_id)
    }

    /// Categories with a registered run, sorted.
    pub fn active_categories(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn release(&self, category_id: DbId, ticket: u64) {
        let mut active = self.lock();
        if active.get(&category_id).is_some_and(|run| run.ticket == ticket) {
            active.remove(&category_id);
        }
    }
}

/// Registration of one run. Dropping it unregisters the run.
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    category_id: DbId,
    ticket: u64,
    token: CancellationToken,
}

impl RunGuard {
    pub fn category_id(&self) -> DbId {
        self.category_id
    }

    /// Token cancelled by [`RunRegistry::stop`].
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(self.category_id, self.ticket);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
