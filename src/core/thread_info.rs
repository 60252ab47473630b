//! Identity of the thread that produced an event
//!
//! Captured on the producer thread at publish time, never on the consumer.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lowest thread priority
pub const MIN_PRIORITY: u8 = 1;
/// Default thread priority
pub const NORM_PRIORITY: u8 = 5;
/// Highest thread priority
pub const MAX_PRIORITY: u8 = 10;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

// Thread-local caches for thread information to avoid repeated allocations
thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    static THREAD_NAME_CACHE: RefCell<Option<Option<Arc<str>>>> = const { RefCell::new(None) };
    static THREAD_PRIORITY: Cell<u8> = const { Cell::new(NORM_PRIORITY) };
}

/// Whether thread names are looked up once per thread or on every event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadNameCaching {
    #[default]
    Cached,
    Uncached,
}

/// Snapshot of the producing thread's identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadInfo {
    pub id: u64,
    pub name: Option<Arc<str>>,
    pub priority: u8,
}

impl ThreadInfo {
    /// Capture the current thread's identity
    pub fn current(caching: ThreadNameCaching) -> Self {
        Self {
            id: current_thread_id(),
            name: current_thread_name(caching),
            priority: current_thread_priority(),
        }
    }

    /// The thread name, or `thread-<id>` for unnamed threads
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None => format!("thread-{}", self.id),
        }
    }
}

/// Process-unique id of the current thread, assigned on first use
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

/// Current thread name, optionally cached for the thread's lifetime
pub fn current_thread_name(caching: ThreadNameCaching) -> Option<Arc<str>> {
    match caching {
        ThreadNameCaching::Uncached => std::thread::current().name().map(Arc::from),
        ThreadNameCaching::Cached => THREAD_NAME_CACHE.with(|cache| {
            cache
                .borrow_mut()
                .get_or_insert_with(|| std::thread::current().name().map(Arc::from))
                .clone()
        }),
    }
}

pub fn current_thread_priority() -> u8 {
    THREAD_PRIORITY.with(Cell::get)
}

/// Set the priority reported for events from the current thread.
///
/// Values are clamped to `MIN_PRIORITY..=MAX_PRIORITY`. This is a label
/// carried on events; it does not change OS scheduling.
pub fn set_current_thread_priority(priority: u8) {
    THREAD_PRIORITY.with(|p| p.set(priority.clamp(MIN_PRIORITY, MAX_PRIORITY)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_per_thread() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());
        let there = std::thread::spawn(current_thread_id)
            .join()
            .expect("thread panicked");
        assert_ne!(here, there);
    }

    #[test]
    fn test_named_thread() {
        let info = std::thread::Builder::new()
            .name("worker-7".into())
            .spawn(|| ThreadInfo::current(ThreadNameCaching::Cached))
            .expect("spawn")
            .join()
            .expect("thread panicked");
        assert_eq!(info.name.as_deref(), Some("worker-7"));
        assert_eq!(info.display_name(), "worker-7");
        assert_eq!(info.priority, NORM_PRIORITY);
    }

    #[test]
    fn test_priority_is_clamped() {
        std::thread::spawn(|| {
            set_current_thread_priority(42);
            assert_eq!(current_thread_priority(), MAX_PRIORITY);
            set_current_thread_priority(0);
            assert_eq!(current_thread_priority(), MIN_PRIORITY);
        })
        .join()
        .expect("thread panicked");
    }
}
