//! Primary → secondary viewer synchronization
//!
//! A single-slot, last-write-wins channel. The primary viewer overwrites
//! the slot on every publish; a subscriber only ever sees the newest
//! snapshot and may skip intermediate ones. Publishing never blocks on
//! the subscriber and never fails, whether or not anyone is listening.

use crate::zoom::ZoomController;
use doc_model::ViewerSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slot {
    latest: Option<ViewerSnapshot>,
    version: u64,
}

#[derive(Debug, Default)]
struct Shared {
    slot: Mutex<Slot>,
    updated: Condvar,
    subscribed: AtomicBool,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewerSyncChannel {
    shared: Arc<Shared>,
}

impl ViewerSyncChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: ViewerSnapshot) {
        {
            let mut slot = self.shared.slot();
            log::debug!("publishing snapshot page {}/{}", snapshot.page, snapshot.page_count);
            slot.latest = Some(snapshot);
            slot.version += 1;
        }

        self.shared.updated.notify_all();
    }

    /// Re-delivers the latest snapshot as if it were new.
    pub fn republish(&self) -> bool {
        let Some(snapshot) = self.latest() else {
            return false;
        };

        self.publish(snapshot);
        true
    }

    pub fn latest(&self) -> Option<ViewerSnapshot> {
        self.shared.slot().latest.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.shared.subscribed.load(Ordering::Acquire)
    }

    /// Attaches the single consumer. Returns `None` while another
    /// subscriber is alive.
    pub fn subscribe(&self) -> Option<SnapshotSubscriber> {
        if self.shared.subscribed.swap(true, Ordering::AcqRel) {
            return None;
        }

        Some(SnapshotSubscriber { shared: Arc::clone(&self.shared), seen: 0 })
    }
}

/// Receiving end. Dropping it detaches from the channel.
#[derive(Debug)]
pub struct SnapshotSubscriber {
    shared: Arc<Shared>,
    seen: u64,
}

impl SnapshotSubscriber {
    /// Newest snapshot not yet seen by this subscriber, if any.
    pub fn try_latest(&mut self) -> Option<ViewerSnapshot> {
        let slot = self.shared.slot();
        if slot.version <= self.seen {
            return None;
        }

        self.seen = slot.version;
        slot.latest.clone()
    }

    pub fn wait_latest(&mut self, timeout: Duration) -> Option<ViewerSnapshot> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot();

        while slot.version <= self.seen {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }

            let (guard, _) = self
                .shared
                .updated
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }

        self.seen = slot.version;
        slot.latest.clone()
    }
}

impl Drop for SnapshotSubscriber {
    fn drop(&mut self) {
        self.shared.subscribed.store(false, Ordering::Release);
    }
}

/// Read-only mirror of the primary viewer living in another window.
///
/// Local zoom is independent of the primary and resets whenever the
/// mirrored document or page changes.
#[derive(Debug)]
pub struct SecondaryViewer {
    subscriber: SnapshotSubscriber,
    current: Option<ViewerSnapshot>,
    zoom: ZoomController,
    needs_render: bool,
}

impl SecondaryViewer {
    pub fn new(subscriber: SnapshotSubscriber, zoom: ZoomController) -> Self {
        Self { subscriber, current: None, zoom, needs_render: false }
    }

    /// Applies the newest pending snapshot. Returns `true` if one was
    /// delivered, including a re-delivery of the snapshot already shown.
    pub fn sync(&mut self) -> bool {
        match self.subscriber.try_latest() {
            Some(snapshot) => self.apply(snapshot),
            None => false,
        }
    }

    pub fn wait_for_update(&mut self, timeout: Duration) -> bool {
        match self.subscriber.wait_latest(timeout) {
            Some(snapshot) => self.apply(snapshot),
            None => false,
        }
    }

    pub fn snapshot(&self) -> Option<&ViewerSnapshot> {
        self.current.as_ref()
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut ZoomController {
        &mut self.zoom
    }

    /// Whether the mirror has changed since the last call.
    pub fn take_needs_render(&mut self) -> bool {
        std::mem::take(&mut self.needs_render)
    }

    fn apply(&mut self, snapshot: ViewerSnapshot) -> bool {
        let view_moved = self.current.as_ref().map_or(true, |current| {
            current.content_ref != snapshot.content_ref || current.page != snapshot.page
        });
        if view_moved {
            self.zoom.reset();
        }

        self.current = Some(snapshot);
        self.needs_render = true;
        true
    }
}
