// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memoizes async calls per argument key and coalesces concurrent duplicates into a single
//! execution.
//!
//! [`memoize`] wraps an async operation and returns two handles that share one private cache:
//!
//! - [`Memoized`], whose [`call`](Memoized::call) invokes the operation at most once per key at a
//!   time and keeps successful values until they are invalidated;
//! - [`Invalidator`], which removes entries so that the next call invokes the operation again.
//!
//! The first caller for a key (the "owner") runs the operation. Callers that arrive while it runs
//! (the "joiners") wait for the owner's outcome instead of running it again, and every one of them
//! receives a clone of that same outcome, value or error. Values stay cached; errors are never
//! cached, so the call after a failure starts a fresh attempt.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use memoflight::{CallArgs, memoize};
//!
//! # futures::executor::block_on(async {
//! let invocations = AtomicUsize::new(0);
//! let (fetch, invalidator) = memoize(|args: CallArgs| {
//!     invocations.fetch_add(1, Ordering::Relaxed);
//!     async move { Ok::<_, String>(format!("row for {args}")) }
//! });
//!
//! let args = CallArgs::new().arg(10).arg(20).named("a", "val_a").named("b", "val_b");
//! let (first, second) = futures::join!(fetch.call(args.clone()), fetch.call(args.clone()));
//! assert_eq!(first, second);
//! assert_eq!(invocations.load(Ordering::Relaxed), 1);
//!
//! invalidator.invalidate(&args);
//! fetch.call(args).await.unwrap();
//! assert_eq!(invocations.load(Ordering::Relaxed), 2);
//! # });
//! ```
//!
//! # Call Keys
//!
//! The argument type of the operation is the call key: any `Hash + Eq + Clone` type works,
//! including tuples. [`CallArgs`] builds keys from positional and named arguments where the order
//! of the named arguments does not matter.
//!
//! # Cancellation
//!
//! Joiners share the owner's attempt, so they also share how it ends:
//!
//! - Dropping a joiner's future detaches only that joiner.
//! - Dropping the owner's future while the operation runs, or the operation panicking, ends the
//!   attempt. The entry is removed and **every joiner receives [`Error::Cancelled`]**, even joiners
//!   that were not cancelled themselves. The next call starts a new attempt.
//!
//! Spawn the call on a task of its own if joiners must not depend on the lifetime of the first
//! caller's future.
//!
//! # Invalidation
//!
//! [`Invalidator::invalidate`] removes an entry whatever its state. Callers already waiting on a
//! pending entry still receive its outcome; only later calls see the removal. Invalidating a key
//! that has no entry does nothing and returns `false`.
//!
//! # Features
//!
//! - `logs`: emits `tracing` events for calls and invalidations once enabled with
//!   `MemoizeBuilder::enable_logs`.

mod builder;
mod error;
mod gate;
pub mod key;
mod slot;
mod telemetry;
#[cfg(test)]
mod testing;

#[doc(inline)]
pub use builder::MemoizeBuilder;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use gate::{Invalidator, Memoized, memoize};
#[doc(inline)]
pub use key::{ArgValue, CallArgs};
#[doc(inline)]
pub use slot::SlotState;
