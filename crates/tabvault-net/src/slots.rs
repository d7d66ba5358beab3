//! Bounded handler pool
//!
//! A fixed number of slots, each owning at most one active connection. The
//! accept thread reserves a slot before spawning a handler; the handler
//! releases it by dropping its [`SlotLease`]. The lock is only held around
//! slot bookkeeping, never across network or disk I/O.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

#[derive(Default)]
struct Slot {
    in_use: bool,
    peer: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
}

/// Fixed-capacity table of handler slots.
pub struct SlotTable {
    slots: Mutex<Vec<Slot>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Arc<Self> {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Arc::new(Self { slots: Mutex::new(slots) })
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Claim the first free slot for `peer`, or `None` if all are taken.
    pub fn reserve(self: &Arc<Self>, peer: SocketAddr) -> Option<SlotLease> {
        let mut slots = self.slots.lock();
        let index = slots.iter().position(|s| !s.in_use)?;
        let slot = &mut slots[index];
        slot.in_use = true;
        slot.peer = Some(peer);
        Some(SlotLease { table: Arc::clone(self), index })
    }

    /// Record the thread serving slot `index` so shutdown can join it.
    ///
    /// Replaces the handle of any earlier, finished occupant.
    pub fn attach(&self, index: usize, worker: JoinHandle<()>) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            slot.worker = Some(worker);
        }
    }

    fn release(&self, index: usize) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            slot.in_use = false;
            slot.peer = None;
        }
    }

    /// Number of slots currently serving a connection.
    pub fn active_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.in_use).count()
    }

    /// Peers of the active connections, by slot.
    pub fn active_peers(&self) -> Vec<(usize, SocketAddr)> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.peer.filter(|_| s.in_use).map(|p| (i, p)))
            .collect()
    }

    /// Remove every recorded worker handle, running or finished.
    pub fn take_workers(&self) -> Vec<JoinHandle<()>> {
        self.slots.lock().iter_mut().filter_map(|s| s.worker.take()).collect()
    }
}

/// Exclusive claim on one slot. Dropping it frees the slot.
pub struct SlotLease {
    table: Arc<SlotTable>,
    index: usize,
}

impl SlotLease {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.table.release(self.index);
    }
}
