//! Per-thread diagnostic context
//!
//! This module provides:
//! - `ContextData`: immutable snapshot of the per-thread key-value map
//! - `ContextStack`: immutable snapshot of the per-thread message stack
//! - `ThreadContext`: the live per-thread state, copy-on-write
//! - `ContextGuard` / `StackGuard`: RAII guards for scoped context
//!
//! Snapshots share storage with the live state until the owning thread
//! mutates it; the mutation then copies, so a snapshot attached to a queued
//! event never changes after it was taken.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Immutable key-value context snapshot. The empty snapshot does not allocate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ContextData {
    inner: Option<Arc<BTreeMap<String, String>>>,
}

impl ContextData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.as_ref()?.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.inner.as_deref().cloned().unwrap_or_default()
    }

    /// True if both snapshots share the same storage
    pub fn shares_storage_with(&self, other: &ContextData) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn insert(&mut self, key: String, value: String) -> Option<String> {
        Arc::make_mut(self.inner.get_or_insert_with(Default::default)).insert(key, value)
    }

    fn remove(&mut self, key: &str) -> Option<String> {
        let map = self.inner.as_mut()?;
        if !map.contains_key(key) {
            return None;
        }
        let removed = Arc::make_mut(map).remove(key);
        if map.is_empty() {
            self.inner = None;
        }
        removed
    }

    /// Format entries as `{k=v, k2=v2}`
    pub fn format_fields(&self) -> String {
        let body = self
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{}}}", body)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ContextData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map: BTreeMap<String, String> =
            iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if map.is_empty() {
            Self::default()
        } else {
            Self {
                inner: Some(Arc::new(map)),
            }
        }
    }
}

impl fmt::Debug for ContextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for ContextData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fields())
    }
}

impl Serialize for ContextData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Immutable stack snapshot, bottom first. The empty snapshot does not allocate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ContextStack {
    inner: Option<Arc<Vec<String>>>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.inner.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    pub fn peek(&self) -> Option<&str> {
        self.inner.as_ref()?.last().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        self.inner.as_deref().map_or(&[], |v| v.as_slice())
    }

    fn push(&mut self, message: String) {
        Arc::make_mut(self.inner.get_or_insert_with(Default::default)).push(message);
    }

    fn pop(&mut self) -> Option<String> {
        let stack = self.inner.as_mut()?;
        let popped = Arc::make_mut(stack).pop();
        if stack.is_empty() {
            self.inner = None;
        }
        popped
    }

    fn truncate(&mut self, depth: usize) {
        if self.depth() <= depth {
            return;
        }
        if depth == 0 {
            self.inner = None;
        } else if let Some(stack) = self.inner.as_mut() {
            Arc::make_mut(stack).truncate(depth);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ContextStack {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let stack: Vec<String> = iter.into_iter().map(Into::into).collect();
        if stack.is_empty() {
            Self::default()
        } else {
            Self {
                inner: Some(Arc::new(stack)),
            }
        }
    }
}

impl fmt::Debug for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl fmt::Display for ContextStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_slice().join(", "))
    }
}

impl Serialize for ContextStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.depth()))?;
        for item in self.as_slice() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

thread_local! {
    static CONTEXT_MAP: RefCell<ContextData> = RefCell::new(ContextData::default());
    static CONTEXT_STACK: RefCell<ContextStack> = RefCell::new(ContextStack::default());
}

/// Live per-thread context.
///
/// # Example
///
/// ```
/// use rust_async_logger::core::ThreadContext;
///
/// ThreadContext::put("request_id", "abc-123");
/// let snapshot = ThreadContext::context_data();
/// ThreadContext::put("request_id", "def-456");
///
/// // The snapshot is unaffected by later mutation
/// assert_eq!(snapshot.get("request_id"), Some("abc-123"));
/// ThreadContext::clear_all();
/// ```
pub struct ThreadContext;

impl ThreadContext {
    pub fn put(key: impl Into<String>, value: impl Into<String>) {
        CONTEXT_MAP.with(|m| {
            m.borrow_mut().insert(key.into(), value.into());
        });
    }

    pub fn get(key: &str) -> Option<String> {
        CONTEXT_MAP.with(|m| m.borrow().get(key).map(str::to_string))
    }

    pub fn remove(key: &str) -> Option<String> {
        CONTEXT_MAP.with(|m| m.borrow_mut().remove(key))
    }

    pub fn clear_map() {
        CONTEXT_MAP.with(|m| *m.borrow_mut() = ContextData::default());
    }

    /// Set `key` for the lifetime of the returned guard, restoring the
    /// previous value (or absence) when it drops
    pub fn put_scoped(key: impl Into<String>, value: impl Into<String>) -> ContextGuard {
        let key = key.into();
        let previous = CONTEXT_MAP.with(|m| m.borrow_mut().insert(key.clone(), value.into()));
        ContextGuard {
            key,
            previous,
            _not_send: PhantomData,
        }
    }

    /// Snapshot of the current key-value context; O(1), no copy
    pub fn context_data() -> ContextData {
        CONTEXT_MAP.with(|m| m.borrow().clone())
    }

    pub fn push(message: impl Into<String>) {
        CONTEXT_STACK.with(|s| s.borrow_mut().push(message.into()));
    }

    pub fn pop() -> Option<String> {
        CONTEXT_STACK.with(|s| s.borrow_mut().pop())
    }

    pub fn peek() -> Option<String> {
        CONTEXT_STACK.with(|s| s.borrow().peek().map(str::to_string))
    }

    pub fn stack_depth() -> usize {
        CONTEXT_STACK.with(|s| s.borrow().depth())
    }

    /// Truncate the stack to at most `depth` entries
    pub fn trim(depth: usize) {
        CONTEXT_STACK.with(|s| s.borrow_mut().truncate(depth));
    }

    pub fn clear_stack() {
        CONTEXT_STACK.with(|s| *s.borrow_mut() = ContextStack::default());
    }

    /// Push `message` for the lifetime of the returned guard
    pub fn push_scoped(message: impl Into<String>) -> StackGuard {
        let depth = Self::stack_depth();
        Self::push(message);
        StackGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Snapshot of the current stack; O(1), no copy
    pub fn context_stack() -> ContextStack {
        CONTEXT_STACK.with(|s| s.borrow().clone())
    }

    /// Release all per-thread context. Call before returning a pooled thread.
    pub fn clear_all() {
        Self::clear_map();
        Self::clear_stack();
    }
}

/// RAII guard for a scoped context key
///
/// # Example
///
/// ```
/// use rust_async_logger::core::ThreadContext;
///
/// {
///     let _guard = ThreadContext::put_scoped("request_id", "abc-123");
///     assert_eq!(ThreadContext::get("request_id").as_deref(), Some("abc-123"));
/// }
/// assert!(ThreadContext::get("request_id").is_none());
/// ```
pub struct ContextGuard {
    key: String,
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let key = std::mem::take(&mut self.key);
        match self.previous.take() {
            Some(previous) => ThreadContext::put(key, previous),
            None => {
                ThreadContext::remove(&key);
            }
        }
    }
}

/// RAII guard for a scoped stack entry; trims the stack back on drop
pub struct StackGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        ThreadContext::trim(self.depth);
    }
}
