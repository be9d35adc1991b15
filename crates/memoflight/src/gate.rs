// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoized entry point and its invalidation handle.

use std::{fmt, hash::Hash, sync::Arc};

use crate::{
    Error, MemoizeBuilder, SlotState,
    slot::{Claim, Publisher, Slot, SlotStore},
    telemetry::{CallActivity, Telemetry},
};

/// State shared by every handle created from one [`memoize`] call.
struct Inner<A, T, E> {
    store: SlotStore<A, T, E>,
    telemetry: Telemetry,
}

/// A memoized, coalescing entry point for an async operation.
///
/// Created together with its [`Invalidator`] by [`memoize`] or [`MemoizeBuilder::build`]. Both
/// handles share one private cache; clones of either handle share it too.
///
/// See [`call`](Self::call) for the calling protocol.
pub struct Memoized<A, T, E, F> {
    operation: Arc<F>,
    inner: Arc<Inner<A, T, E>>,
}

/// Removes entries from the cache of the [`Memoized`] it was created with.
pub struct Invalidator<A, T, E> {
    inner: Arc<Inner<A, T, E>>,
}

/// Wraps `operation` in a memoizing, coalescing gate with default settings.
///
/// Returns the memoized entry point and the invalidation handle for its cache. Use
/// [`Memoized::builder`] to configure the gate.
///
/// # Examples
///
/// ```
/// use memoflight::{CallArgs, memoize};
///
/// # futures::executor::block_on(async {
/// let (lookup, invalidator) = memoize(|args: CallArgs| async move {
///     Ok::<_, std::io::ErrorKind>(format!("user {}", args.get(0).unwrap()))
/// });
///
/// let args = CallArgs::new().arg(42);
/// assert_eq!(lookup.call(args.clone()).await, Ok("user 42".to_string()));
///
/// // Served from the cache until invalidated.
/// assert_eq!(lookup.len(), 1);
/// assert!(invalidator.invalidate(&args));
/// assert!(lookup.is_empty());
/// # });
/// ```
pub fn memoize<A, T, E, F, Fut>(operation: F) -> (Memoized<A, T, E, F>, Invalidator<A, T, E>)
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    MemoizeBuilder::new(operation).build()
}

impl Memoized<(), (), (), ()> {
    /// Starts configuring a gate around `operation`.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::Memoized;
    ///
    /// let (fetch, _invalidator) = Memoized::builder(|id: u64| async move { Ok::<_, String>(id * 2) })
    ///     .name("doubler")
    ///     .build();
    /// assert_eq!(fetch.name(), "doubler");
    /// ```
    #[must_use]
    pub fn builder<F>(operation: F) -> MemoizeBuilder<F> {
        MemoizeBuilder::new(operation)
    }
}

impl<A, T, E, F> Memoized<A, T, E, F> {
    pub(crate) fn new(operation: F, telemetry: Telemetry) -> (Self, Invalidator<A, T, E>) {
        let inner = Arc::new(Inner {
            store: SlotStore::default(),
            telemetry,
        });
        let invalidator = Invalidator {
            inner: Arc::clone(&inner),
        };
        (
            Self {
                operation: Arc::new(operation),
                inner,
            },
            invalidator,
        )
    }

    /// The name used to identify this gate in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.telemetry.name
    }

    /// Returns another invalidation handle for this gate's cache.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator<A, T, E> {
        Invalidator {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E, F, Fut> Memoized<A, T, E, F>
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    /// Returns the value of the operation for `args`, invoking it at most once per key.
    ///
    /// - If no entry exists for `args`, this call becomes the owner: it creates the entry and
    ///   invokes the operation. A value is cached until invalidated; an error removes the entry
    ///   before it is delivered, so the next call starts a fresh attempt.
    /// - If an entry exists, this call joins it and waits for the owner's outcome without invoking
    ///   the operation. A resolved entry answers immediately.
    ///
    /// The owner and every joiner receive clones of one outcome, delivered through the same
    /// channel.
    ///
    /// # Cancellation
    ///
    /// Dropping a joiner's future only detaches that joiner. Dropping the owner's future while the
    /// operation runs (or the operation panicking) counts as a failed attempt: the entry is
    /// removed and **every** joiner of that attempt receives [`Error::Cancelled`], including
    /// joiners that were never cancelled themselves. They shared one attempt, so they share its
    /// end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Operation`] carrying the operation's own error, or [`Error::Cancelled`] if
    /// the owning invocation ended without an outcome.
    pub async fn call(&self, args: A) -> Result<T, Error<E>> {
        let inner = &*self.inner;
        match inner.store.find_or_create(&args) {
            Claim::Joiner(slot) => {
                let activity = if slot.state() == SlotState::Resolved {
                    CallActivity::Hit
                } else {
                    CallActivity::Joined
                };
                inner.telemetry.record(activity);
                slot.wait().await
            }
            Claim::Owner { slot, publisher } => {
                inner.telemetry.record(CallActivity::Owned);
                let guard = OwnerGuard {
                    inner,
                    key: args.clone(),
                    slot: slot.clone(),
                    publisher: Some(publisher),
                };
                let outcome = (self.operation)(args).await;
                guard.publish(outcome);
                slot.wait().await
            }
        }
    }

    /// Reports the state of the cache entry for `args`, if there is one.
    #[must_use]
    pub fn state(&self, args: &A) -> Option<SlotState> {
        self.inner.store.state(args)
    }

    /// Number of entries in the cache, pending and resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A, T, E, F> Clone for Memoized<A, T, E, F> {
    fn clone(&self) -> Self {
        Self {
            operation: Arc::clone(&self.operation),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E, F> fmt::Debug for Memoized<A, T, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.inner.telemetry.name)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl<A, T, E> Invalidator<A, T, E>
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
{
    /// Removes the cache entry for `args`, whatever its state.
    ///
    /// Callers already attached to that entry still receive its outcome; only later calls start a
    /// new invocation. Invalidating a key without an entry is a no-op.
    ///
    /// Returns `true` if an entry was removed.
    pub fn invalidate(&self, args: &A) -> bool {
        let removed = self.inner.store.remove(args);
        if removed {
            self.inner.telemetry.record(CallActivity::Invalidated);
        }
        removed
    }

    /// Removes every cache entry under the same rules as [`invalidate`](Self::invalidate).
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_all(&self) -> usize {
        let removed = self.inner.store.clear();
        if removed > 0 {
            self.inner.telemetry.record(CallActivity::Cleared);
        }
        removed
    }
}

impl<A, T, E> Clone for Invalidator<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, T, E> fmt::Debug for Invalidator<A, T, E> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("name", &self.inner.telemetry.name)
            .finish_non_exhaustive()
    }
}

/// Publishes the owner's outcome, or cancels the attempt if the owner goes away first.
struct OwnerGuard<'a, A, T, E>
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
{
    inner: &'a Inner<A, T, E>,
    key: A,
    slot: Slot<T, E>,
    publisher: Option<Publisher<T, E>>,
}

impl<A, T, E> OwnerGuard<'_, A, T, E>
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
{
    fn publish(mut self, outcome: Result<T, E>) {
        let Some(publisher) = self.publisher.take() else {
            return;
        };

        match outcome {
            Ok(value) => {
                publisher.publish(Ok(value));
                self.inner.telemetry.record(CallActivity::Resolved);
            }
            Err(error) => {
                // Removal must precede publication: nobody may join a failed attempt.
                self.inner.store.remove_if_same(&self.key, &self.slot);
                publisher.publish(Err(error));
                self.inner.telemetry.record(CallActivity::Failed);
            }
        }
    }
}

impl<A, T, E> Drop for OwnerGuard<'_, A, T, E>
where
    A: Hash + Eq + Clone,
    T: Clone,
    E: Clone,
{
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            self.inner.store.remove_if_same(&self.key, &self.slot);
            drop(publisher);
            self.inner.telemetry.record(CallActivity::Cancelled);
        }
    }
}
