//! Bounded multi-producer ring buffer of pre-allocated slots
//!
//! This module implements the sequence-based claim/publish protocol:
//!
//! - Producers claim the next sequence with a CAS on the shared cursor, write
//!   the slot in place, then mark the slot available for that sequence
//! - A single consumer reads sequences strictly in order, clears each slot
//!   after processing, and periodically publishes its position so producers
//!   can reuse the freed slots
//! - Cursor and consumer position live on separate cache lines
//!
//! A slot at index `seq & mask` is only reclaimed once the consumer position
//! has passed `seq - capacity`, so producers and the consumer never hold a
//! writable view of the same slot at the same time.

use super::wait_strategy::{WaitOutcome, WaitStrategy, Waiter};
use crate::core::error::{LoggerError, Result};
use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consumer position is published at least this often inside a long batch
pub const NOTIFY_PROGRESS_THRESHOLD: usize = 50;

const INITIAL_SEQUENCE: i64 = -1;

/// An event type that can live in a ring buffer slot
pub trait SlotEvent: Default + Send {
    /// Release everything the slot references so it can be reused
    fn clear(&mut self);

    /// False if the producer never finished writing this slot
    fn is_populated(&self) -> bool {
        true
    }
}

/// Why the consumer could not claim the next slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// The buffer was halted
    Halted,
    /// Nothing was published before the timeout
    TimedOut,
}

/// Fixed-capacity ring of reusable slots
pub struct RingBuffer<E: SlotEvent> {
    slots: Box<[UnsafeCell<E>]>,
    /// Sequence last published into each slot
    available: Box<[AtomicI64]>,
    mask: usize,
    /// Highest claimed sequence
    cursor: CachePadded<AtomicI64>,
    /// Highest sequence the consumer has finished and cleared
    consumed: CachePadded<AtomicI64>,
    halted: AtomicBool,
    consumer_taken: AtomicBool,
    waiter: Waiter,
}

// SAFETY: slot access is serialized by the claim/publish protocol. A producer
// writes a slot only between a successful claim and its publish; the consumer
// touches it only after observing the publish and before advancing `consumed`.
unsafe impl<E: SlotEvent> Sync for RingBuffer<E> {}

impl<E: SlotEvent> RingBuffer<E> {
    /// Allocate `capacity` slots up front. `capacity` must be a power of two.
    pub fn new(capacity: usize, wait_strategy: WaitStrategy) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(LoggerError::config(
                "ring_buffer_size",
                format!("capacity must be a power of two, got {}", capacity),
            ));
        }
        if capacity > (1 << 30) {
            return Err(LoggerError::config(
                "ring_buffer_size",
                format!("capacity {} is too large", capacity),
            ));
        }

        let slots = (0..capacity).map(|_| UnsafeCell::new(E::default())).collect();
        let available = (0..capacity).map(|_| AtomicI64::new(INITIAL_SEQUENCE)).collect();

        Ok(Self {
            slots,
            available,
            mask: capacity - 1,
            cursor: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            consumed: CachePadded::new(AtomicI64::new(INITIAL_SEQUENCE)),
            halted: AtomicBool::new(false),
            consumer_taken: AtomicBool::new(false),
            waiter: Waiter::new(wait_strategy),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.waiter.strategy()
    }

    /// Highest claimed sequence, `-1` before the first claim
    #[inline]
    pub fn cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Highest sequence the consumer has released, `-1` initially
    #[inline]
    pub fn consumed_sequence(&self) -> i64 {
        self.consumed.load(Ordering::Acquire)
    }

    /// Free slots right now. May be stale by the time the caller reads it.
    pub fn remaining_capacity(&self) -> usize {
        let in_flight = self.cursor() - self.consumed_sequence();
        self.capacity().saturating_sub(in_flight.max(0) as usize)
    }

    /// True while claimed events have not yet been released by the consumer
    pub fn has_backlog(&self) -> bool {
        self.cursor() > self.consumed_sequence()
    }

    /// Number of claimed events the consumer has not yet released
    pub fn backlog(&self) -> u64 {
        (self.cursor() - self.consumed_sequence()).max(0) as u64
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Stop the consumer and make all later publishes fail.
    ///
    /// A publish that passed its halt check before this call may still claim
    /// a slot, so the cursor is only final once such producers have returned.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
        self.waiter.alert();
    }

    #[inline]
    fn index(&self, sequence: i64) -> usize {
        (sequence as usize) & self.mask
    }

    #[inline]
    fn is_available(&self, sequence: i64) -> bool {
        self.available[self.index(sequence)].load(Ordering::Acquire) == sequence
    }

    fn try_claim(&self) -> Option<i64> {
        let capacity = self.capacity() as i64;
        loop {
            let current = self.cursor.load(Ordering::Acquire);
            let next = current + 1;
            if next - capacity > self.consumed.load(Ordering::Acquire) {
                return None;
            }
            if self
                .cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(next);
            }
        }
    }

    fn write_and_publish<F>(&self, sequence: i64, translate: F)
    where
        F: FnOnce(&mut E, i64),
    {
        // Publishes on drop, so a panicking translator cannot stall the sequence
        let _publish = PublishOnDrop {
            ring: self,
            sequence,
        };
        // SAFETY: `sequence` was claimed by this thread and is not yet
        // published, so no other thread can access the slot.
        let slot = unsafe { &mut *self.slots[self.index(sequence)].get() };
        translate(slot, sequence);
    }

    fn publish(&self, sequence: i64) {
        self.available[self.index(sequence)].store(sequence, Ordering::Release);
        self.waiter.signal_all_when_blocking();
    }

    /// Claim a slot without blocking, fill it with `translate`, and publish.
    ///
    /// Returns `false` if the buffer is full or halted; `translate` is not
    /// called in that case.
    pub fn try_publish_with<F>(&self, translate: F) -> bool
    where
        F: FnOnce(&mut E, i64),
    {
        if self.is_halted() {
            return false;
        }
        match self.try_claim() {
            Some(sequence) => {
                self.write_and_publish(sequence, translate);
                true
            }
            None => false,
        }
    }

    /// Claim a slot, waiting for the consumer to free one if necessary.
    ///
    /// Must not be called from the consumer thread: it would wait on itself.
    /// Returns `false` only if the buffer is halted before a slot frees up.
    pub fn publish_with<F>(&self, translate: F) -> bool
    where
        F: FnOnce(&mut E, i64),
    {
        let backoff = Backoff::new();
        loop {
            if self.is_halted() {
                return false;
            }
            if let Some(sequence) = self.try_claim() {
                self.write_and_publish(sequence, translate);
                return true;
            }
            if backoff.is_completed() {
                std::thread::sleep(Duration::from_micros(50));
            } else {
                backoff.snooze();
            }
        }
    }

    /// The single consumer of this buffer. A second call fails.
    pub fn consumer(self: &Arc<Self>) -> Result<RingConsumer<E>> {
        if self.consumer_taken.swap(true, Ordering::AcqRel) {
            return Err(LoggerError::other("ring buffer already has a consumer"));
        }
        Ok(RingConsumer {
            ring: Arc::clone(self),
            next: self.consumed_sequence() + 1,
            batch_end: self.consumed_sequence(),
            unreported: 0,
        })
    }

    /// Highest sequence in `from..=cursor` such that every sequence up to it
    /// is published
    fn highest_published(&self, from: i64) -> i64 {
        let cursor = self.cursor();
        let mut sequence = from;
        while sequence <= cursor {
            if !self.is_available(sequence) {
                return sequence - 1;
            }
            sequence += 1;
        }
        cursor
    }
}

impl<E: SlotEvent> fmt::Debug for RingBuffer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("cursor", &self.cursor())
            .field("consumed", &self.consumed_sequence())
            .field("halted", &self.is_halted())
            .finish()
    }
}

struct PublishOnDrop<'a, E: SlotEvent> {
    ring: &'a RingBuffer<E>,
    sequence: i64,
}

impl<E: SlotEvent> Drop for PublishOnDrop<'_, E> {
    fn drop(&mut self) {
        self.ring.publish(self.sequence);
    }
}

/// Consumer side of a [`RingBuffer`]
pub struct RingConsumer<E: SlotEvent> {
    ring: Arc<RingBuffer<E>>,
    next: i64,
    /// Last sequence of the current run of published events
    batch_end: i64,
    /// Events released since the position was last published
    unreported: usize,
}

impl<E: SlotEvent> RingConsumer<E> {
    pub fn ring(&self) -> &Arc<RingBuffer<E>> {
        &self.ring
    }

    /// Sequence the next claim will return
    pub fn next_sequence(&self) -> i64 {
        self.next
    }

    fn report_progress(&mut self) {
        self.ring.consumed.store(self.next - 1, Ordering::Release);
        self.unreported = 0;
    }

    /// Wait for the next published slot, in sequence order.
    ///
    /// `timeout` of `None` waits until an event arrives or the buffer is halted.
    pub fn claim_next(&mut self, timeout: Option<Duration>) -> std::result::Result<ClaimedSlot<'_, E>, ClaimError> {
        let sequence = self.next;
        if self.ring.is_halted() {
            self.report_progress();
            return Err(ClaimError::Halted);
        }

        if sequence > self.batch_end {
            if !self.ring.is_available(sequence) {
                // Let blocked producers see everything released so far
                self.report_progress();
                let ring = &self.ring;
                let deadline = timeout.map(|t| Instant::now() + t);
                match ring.waiter.wait_until(
                    || ring.is_available(sequence),
                    || ring.is_halted(),
                    deadline,
                ) {
                    WaitOutcome::Ready => {}
                    WaitOutcome::Alerted => return Err(ClaimError::Halted),
                    WaitOutcome::TimedOut => return Err(ClaimError::TimedOut),
                }
            }
            self.batch_end = self.ring.highest_published(sequence);
        }

        let end_of_batch = sequence == self.batch_end;
        Ok(ClaimedSlot {
            consumer: self,
            sequence,
            end_of_batch,
        })
    }
}

impl<E: SlotEvent> Drop for RingConsumer<E> {
    fn drop(&mut self) {
        self.report_progress();
    }
}

impl<E: SlotEvent> fmt::Debug for RingConsumer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingConsumer")
            .field("next", &self.next)
            .field("batch_end", &self.batch_end)
            .finish()
    }
}

/// A published slot held by the consumer.
///
/// Dropping it clears the slot and releases it back to producers.
pub struct ClaimedSlot<'a, E: SlotEvent> {
    consumer: &'a mut RingConsumer<E>,
    sequence: i64,
    end_of_batch: bool,
}

impl<E: SlotEvent> ClaimedSlot<'_, E> {
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    /// True for the last event of a run of continuously published events
    pub fn is_end_of_batch(&self) -> bool {
        self.end_of_batch
    }

    fn slot_ptr(&self) -> *mut E {
        let ring = &self.consumer.ring;
        ring.slots[ring.index(self.sequence)].get()
    }
}

impl<E: SlotEvent> Deref for ClaimedSlot<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        // SAFETY: the slot is published and not yet released, so producers
        // cannot claim it and this consumer is its only accessor.
        unsafe { &*self.slot_ptr() }
    }
}

impl<E: SlotEvent> DerefMut for ClaimedSlot<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        // SAFETY: see `deref`
        unsafe { &mut *self.slot_ptr() }
    }
}

impl<E: SlotEvent> Drop for ClaimedSlot<'_, E> {
    fn drop(&mut self) {
        self.deref_mut().clear();
        let consumer = &mut *self.consumer;
        consumer.next = self.sequence + 1;
        consumer.unreported += 1;
        if self.end_of_batch || consumer.unreported >= NOTIFY_PROGRESS_THRESHOLD {
            consumer.report_progress();
        }
    }
}
