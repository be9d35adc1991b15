// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{borrow::Cow, fmt, hash::Hash};

use crate::{
    Invalidator, Memoized,
    telemetry::{DEFAULT_NAME, Telemetry},
};

/// Configures a memoizing gate before it is built.
///
/// Settings apply to the whole gate; there is no per-key configuration.
///
/// # Examples
///
/// ```
/// use memoflight::{CallArgs, Memoized};
///
/// # futures::executor::block_on(async {
/// let (profile, _invalidator) = Memoized::builder(|args: CallArgs| async move {
///     Ok::<_, String>(args.to_string())
/// })
/// .name("profile_lookup")
/// .build();
///
/// let value = profile.call(CallArgs::new().arg(7).named("region", "eu")).await;
/// assert_eq!(value, Ok(r#"(7, region="eu")"#.to_string()));
/// # });
/// ```
pub struct MemoizeBuilder<F> {
    operation: F,
    name: Cow<'static, str>,
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
}

impl<F> MemoizeBuilder<F> {
    /// Creates a builder around `operation` with default settings: the name `"memoize"` and
    /// logging disabled.
    #[must_use]
    pub fn new(operation: F) -> Self {
        Self {
            operation,
            name: Cow::Borrowed(DEFAULT_NAME),
            #[cfg(any(feature = "logs", test))]
            logs_enabled: false,
        }
    }

    /// Sets the name that identifies this gate in log events. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables structured log events for calls and invalidations.
    ///
    /// Events are emitted through `tracing` with the gate name and the activity; argument values
    /// are never logged.
    #[must_use]
    #[cfg(any(feature = "logs", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Builds the gate, returning its memoized entry point and its invalidation handle.
    ///
    /// Every call creates a new, independent cache.
    pub fn build<A, T, E, Fut>(self) -> (Memoized<A, T, E, F>, Invalidator<A, T, E>)
    where
        A: Hash + Eq + Clone,
        T: Clone,
        E: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let telemetry = Telemetry {
            name: self.name,
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
        };
        Memoized::new(self.operation, telemetry)
    }
}

impl<F> fmt::Debug for MemoizeBuilder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizeBuilder").field("name", &self.name).finish_non_exhaustive()
    }
}
