// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key slots and the store that maps call keys to them.
//!
//! A slot's outcome holder is a oneshot channel whose receiver is broadcast with
//! [`Shared`]: the single [`Publisher`] sends at most once, any number of waiters observe the
//! same outcome, and waiters that attach after publication see it immediately. Dropping the
//! publisher without sending resolves every waiter as cancelled.

use std::{collections::HashMap, fmt, hash::Hash, mem};

use ahash::RandomState;
use futures_channel::oneshot;
use futures_util::{FutureExt, future::Shared};
use parking_lot::Mutex;

use crate::Error;

type Outcome<T, E> = Result<T, E>;

/// Point-in-time view of a slot's outcome holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// The owner has not published an outcome yet.
    Pending,
    /// The owner published a value; the slot serves it to every later caller.
    Resolved,
    /// The owner failed or was cancelled.
    ///
    /// Failed slots are removed from the cache before their outcome is published, so only callers
    /// that already joined the attempt can observe this state.
    Failed,
}

/// Shared handle to one key's single-assignment outcome.
pub(crate) struct Slot<T, E> {
    outcome: Shared<oneshot::Receiver<Outcome<T, E>>>,
}

/// The write side of a slot, held by the slot's owner.
pub(crate) struct Publisher<T, E> {
    sender: oneshot::Sender<Outcome<T, E>>,
}

impl<T, E> Slot<T, E>
where
    T: Clone,
    E: Clone,
{
    fn new() -> (Self, Publisher<T, E>) {
        let (sender, receiver) = oneshot::channel();
        (Self { outcome: receiver.shared() }, Publisher { sender })
    }

    /// Waits until the outcome is published and returns a clone of it.
    pub(crate) async fn wait(self) -> Result<T, Error<E>> {
        match self.outcome.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(Error::Operation(error)),
            Err(oneshot::Canceled) => Err(Error::Cancelled),
        }
    }

    pub(crate) fn state(&self) -> SlotState {
        match self.outcome.peek() {
            None => SlotState::Pending,
            Some(Ok(Ok(_))) => SlotState::Resolved,
            Some(Ok(Err(_)) | Err(_)) => SlotState::Failed,
        }
    }

    /// Identity comparison: `true` only for handles to the very same outcome holder.
    pub(crate) fn same(&self, other: &Self) -> bool {
        self.outcome.ptr_eq(&other.outcome)
    }
}

impl<T, E> Clone for Slot<T, E>
where
    T: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Slot<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").finish_non_exhaustive()
    }
}

impl<T, E> Publisher<T, E> {
    /// Publishes the outcome to every current and future waiter of the slot.
    pub(crate) fn publish(self, outcome: Outcome<T, E>) {
        // Fails only when every waiter is gone, in which case nobody is left to tell.
        let _ = self.sender.send(outcome);
    }
}

impl<T, E> fmt::Debug for Publisher<T, E> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}

/// Result of [`SlotStore::find_or_create`].
#[derive(Debug)]
pub(crate) enum Claim<T, E> {
    /// The slot was just created; the caller must invoke the operation and publish.
    Owner { slot: Slot<T, E>, publisher: Publisher<T, E> },
    /// The slot already existed; the caller only waits.
    Joiner(Slot<T, E>),
}

/// Mapping from call key to slot.
///
/// Every method takes the lock for a single lookup or mutation and releases it before returning,
/// so the lock is never held across an await point. Removed slots are dropped only after the lock
/// is released: dropping the last handle to a cached value runs its destructor, which may call
/// back into the store.
pub(crate) struct SlotStore<K, T, E> {
    slots: Mutex<HashMap<K, Slot<T, E>, RandomState>>,
}

impl<K, T, E> Default for SlotStore<K, T, E> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::default()),
        }
    }
}

impl<K, T, E> SlotStore<K, T, E>
where
    K: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
{
    /// Returns the existing slot for `key`, or creates and inserts a pending one.
    ///
    /// Check and insert happen under one lock acquisition, so at most one concurrent caller per
    /// key is handed [`Claim::Owner`].
    pub(crate) fn find_or_create(&self, key: &K) -> Claim<T, E> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            return Claim::Joiner(slot.clone());
        }

        let (slot, publisher) = Slot::new();
        slots.insert(key.clone(), slot.clone());
        Claim::Owner { slot, publisher }
    }

    /// Removes the entry for `key`, whatever its state. Returns `false` if there was none.
    pub(crate) fn remove(&self, key: &K) -> bool {
        let removed = self.slots.lock().remove(key);
        removed.is_some()
    }

    /// Removes the entry for `key` only if it is still `slot`.
    ///
    /// An owner whose slot was invalidated and replaced by a newer generation must not delete
    /// the replacement when it fails.
    pub(crate) fn remove_if_same(&self, key: &K, slot: &Slot<T, E>) -> bool {
        let removed = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(current) if current.same(slot) => slots.remove(key),
                _ => None,
            }
        };
        removed.is_some()
    }

    /// Removes every entry and returns how many there were.
    pub(crate) fn clear(&self) -> usize {
        let removed = mem::take(&mut *self.slots.lock());
        removed.len()
    }

    pub(crate) fn state(&self, key: &K) -> Option<SlotState> {
        self.slots.lock().get(key).map(Slot::state)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

impl<K, T, E> fmt::Debug for SlotStore<K, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotStore").field("len", &self.slots.lock().len()).finish()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::executor::block_on;

    use super::*;

    type Store = SlotStore<&'static str, String, String>;

    fn owner(claim: Claim<String, String>) -> (Slot<String, String>, Publisher<String, String>) {
        match claim {
            Claim::Owner { slot, publisher } => (slot, publisher),
            Claim::Joiner(_) => panic!("expected to own the slot"),
        }
    }

    fn joiner(claim: Claim<String, String>) -> Slot<String, String> {
        match claim {
            Claim::Joiner(slot) => slot,
            Claim::Owner { .. } => panic!("expected to join the slot"),
        }
    }

    #[test]
    fn first_caller_owns_later_callers_join() {
        let store = Store::default();

        let (slot, _publisher) = owner(store.find_or_create(&"key"));
        let joined = joiner(store.find_or_create(&"key"));

        assert!(slot.same(&joined));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_keys_get_distinct_slots() {
        let store = Store::default();

        let (first, _p1) = owner(store.find_or_create(&"a"));
        let (second, _p2) = owner(store.find_or_create(&"b"));

        assert!(!first.same(&second));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn publish_reaches_early_and_late_waiters() {
        let store = Store::default();
        let (slot, publisher) = owner(store.find_or_create(&"key"));
        let early = joiner(store.find_or_create(&"key"));

        assert_eq!(slot.state(), SlotState::Pending);
        publisher.publish(Ok("value".to_string()));

        assert_eq!(block_on(early.wait()), Ok("value".to_string()));
        let late = joiner(store.find_or_create(&"key"));
        assert_eq!(block_on(late.wait()), Ok("value".to_string()));
        assert_eq!(store.state(&"key"), Some(SlotState::Resolved));
    }

    #[test]
    fn published_error_is_delivered() {
        let store = Store::default();
        let (slot, publisher) = owner(store.find_or_create(&"key"));

        publisher.publish(Err("boom".to_string()));

        assert_eq!(block_on(slot.clone().wait()), Err(Error::Operation("boom".to_string())));
        assert_eq!(slot.state(), SlotState::Failed);
    }

    #[test]
    fn dropped_publisher_cancels_waiters() {
        let store = Store::default();
        let (slot, publisher) = owner(store.find_or_create(&"key"));

        drop(publisher);

        assert_eq!(block_on(slot.clone().wait()), Err(Error::Cancelled));
        assert_eq!(slot.state(), SlotState::Failed);
    }

    #[test]
    fn remove_is_unconditional_and_idempotent() {
        let store = Store::default();
        let (_slot, _publisher) = owner(store.find_or_create(&"key"));

        assert!(store.remove(&"key"));
        assert!(!store.remove(&"key"));
        assert_eq!(store.state(&"key"), None);
    }

    #[test]
    fn remove_if_same_spares_newer_generation() {
        let store = Store::default();
        let (stale, _p1) = owner(store.find_or_create(&"key"));
        assert!(store.remove(&"key"));
        let (fresh, _p2) = owner(store.find_or_create(&"key"));

        assert!(!store.remove_if_same(&"key", &stale));
        assert_eq!(store.len(), 1);

        assert!(store.remove_if_same(&"key", &fresh));
        assert_eq!(store.len(), 0);
    }

    /// A cached value whose destructor reads the store it lives in.
    #[derive(Clone)]
    struct Reentrant(Arc<dyn Fn() + Send + Sync>);

    impl Drop for Reentrant {
        fn drop(&mut self) {
            (self.0)();
        }
    }

    type ReentrantStore = SlotStore<&'static str, Reentrant, String>;

    fn resolve_reentrant(store: &Arc<ReentrantStore>, key: &'static str, seen: &Arc<AtomicUsize>) {
        let value = Reentrant(Arc::new({
            let store = Arc::clone(store);
            let seen = Arc::clone(seen);
            move || seen.store(store.len(), Ordering::Relaxed)
        }));
        let Claim::Owner { slot, publisher } = store.find_or_create(&key) else {
            panic!("expected to own the slot");
        };
        publisher.publish(Ok(value));
        drop(block_on(slot.wait()));
    }

    #[test]
    fn removed_values_are_dropped_outside_the_lock() {
        let store = Arc::new(ReentrantStore::default());
        let seen = Arc::new(AtomicUsize::new(usize::MAX));

        resolve_reentrant(&store, "a", &seen);
        resolve_reentrant(&store, "b", &seen);
        resolve_reentrant(&store, "c", &seen);
        assert_eq!(seen.load(Ordering::Relaxed), 3);

        assert!(store.remove(&"a"));
        assert_eq!(seen.load(Ordering::Relaxed), 2);

        let Claim::Joiner(b) = store.find_or_create(&"b") else {
            panic!("expected to join the slot");
        };
        assert!(store.remove_if_same(&"b", &b));
        drop(b);
        assert_eq!(seen.load(Ordering::Relaxed), 1);

        assert_eq!(store.clear(), 1);
        assert_eq!(seen.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn clear_reports_count() {
        let store = Store::default();
        let _a = store.find_or_create(&"a");
        let _b = store.find_or_create(&"b");

        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        assert!(format!("{store:?}").contains("len: 0"));
    }
}
