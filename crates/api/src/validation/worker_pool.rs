//! Bounded pool of numbered execution slots.
//!
//! Slots are tokens in a channel prefilled with `1..=size`. Dispatching
//! takes a token, the spawned task holds it, and the token goes back when
//! the task ends, including by panic.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A reserved execution slot. Returned to the pool on drop.
pub struct Slot {
    id: usize,
    release: mpsc::Sender<usize>,
}

impl Slot {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // Capacity equals the number of slots, so this never fails for space.
        let _ = self.release.try_send(self.id);
    }
}

pub struct WorkerPool {
    size: usize,
    free_tx: mpsc::Sender<usize>,
    free_rx: mpsc::Receiver<usize>,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    /// Pool with `size` slots (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (free_tx, free_rx) = mpsc::channel(size);
        for id in 1..=size {
            let _ = free_tx.try_send(id);
        }
        Self {
            size,
            free_tx,
            free_rx,
            tasks: JoinSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free slot.
    ///
    /// Returns `None` once `cancel` is cancelled; cancellation wins over a
    /// slot that is free at the same time.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Option<Slot> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            id = self.free_rx.recv() => id.map(|id| Slot {
                id,
                release: self.free_tx.clone(),
            }),
        }
    }

    /// Run `work` on its own task while holding `slot`.
    pub fn spawn<F>(&mut self, slot: Slot, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            let _slot = slot;
            work.await;
        });
    }

    /// Wait for every dispatched task. Returns how many panicked.
    pub async fn drain(mut self) -> usize {
        let mut panicked = 0;
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Validation worker panicked");
                panicked += 1;
            }
        }
        panicked
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
