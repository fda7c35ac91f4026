//! Renewal queue
//!
//! A fixed-capacity ring buffer backed by an unbounded overflow list. When the
//! ring is full its whole content moves to the overflow list and the ring
//! starts over from slot zero, so producers never wait on ring space and the
//! ring's storage is reused across drains.

use parking_lot::Mutex;

struct Ring<T> {
    slots: Vec<Option<T>>,
    read: usize,
    write: usize,
    count: usize,
    // Always older than anything in the ring
    overflow: Vec<T>,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn take_ring(&mut self, out: &mut Vec<T>) {
        let capacity = self.capacity();
        for i in 0..self.count {
            if let Some(item) = self.slots[(self.read + i) % capacity].take() {
                out.push(item);
            }
        }
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }
}

/// Mutex-guarded ring buffer with overflow spillover
pub struct RenewalQueue<T> {
    ring: Mutex<Ring<T>>,
}

impl<T> RenewalQueue<T> {
    /// Create a queue whose ring holds `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            ring: Mutex::new(Ring {
                slots,
                read: 0,
                write: 0,
                count: 0,
                overflow: Vec::new(),
            }),
        }
    }

    /// Append an item
    pub fn push(&self, item: T) {
        let mut ring = self.ring.lock();

        if ring.count >= ring.capacity() {
            let mut overflow = std::mem::take(&mut ring.overflow);
            ring.take_ring(&mut overflow);
            ring.overflow = overflow;
        }

        let write = ring.write;
        ring.slots[write] = Some(item);
        ring.write = (write + 1) % ring.capacity();
        ring.count += 1;
    }

    /// Remove and return everything queued, oldest first
    pub fn drain(&self) -> Vec<T> {
        let mut ring = self.ring.lock();
        let mut items = std::mem::take(&mut ring.overflow);
        items.reserve(ring.count);
        ring.take_ring(&mut items);
        items
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        let ring = self.ring.lock();
        ring.count + ring.overflow.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items currently spilled into the overflow list
    pub fn overflow_len(&self) -> usize {
        self.ring.lock().overflow.len()
    }
}
