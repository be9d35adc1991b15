// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for memoized calls.

use std::borrow::Cow;

pub(crate) const DEFAULT_NAME: &str = "memoize";

/// What happened to a call or to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallActivity {
    /// The caller created the slot and invokes the operation.
    Owned,
    /// The caller attached to a pending slot.
    Joined,
    /// The caller found a resolved slot.
    Hit,
    /// The owner published a value.
    Resolved,
    /// The owner published an error.
    Failed,
    /// The owner ended without publishing.
    Cancelled,
    /// An entry was removed on request.
    Invalidated,
    /// Every entry was removed on request.
    Cleared,
}

impl CallActivity {
    #[cfg(any(feature = "logs", test))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Owned => "memo.owned",
            Self::Joined => "memo.joined",
            Self::Hit => "memo.hit",
            Self::Resolved => "memo.resolved",
            Self::Failed => "memo.failed",
            Self::Cancelled => "memo.cancelled",
            Self::Invalidated => "memo.invalidated",
            Self::Cleared => "memo.cleared",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Telemetry {
    pub(crate) name: Cow<'static, str>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

impl Telemetry {
    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, clippy::unused_self, reason = "unused when logs feature not used")
    )]
    pub(crate) fn record(&self, activity: CallActivity) {
        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            emit(&self.name, activity);
        }
    }
}

// Event level must be a constant, hence one arm per level.
#[cfg(any(feature = "logs", test))]
fn emit(name: &str, activity: CallActivity) {
    macro_rules! emit_event {
        ($level:expr) => {
            tracing::event!(
                name: "memoflight.call",
                $level,
                memo.name = name,
                memo.activity = activity.as_str()
            )
        };
    }

    match activity {
        CallActivity::Owned | CallActivity::Joined | CallActivity::Hit | CallActivity::Resolved => {
            emit_event!(tracing::Level::DEBUG);
        }
        CallActivity::Invalidated | CallActivity::Cleared => emit_event!(tracing::Level::INFO),
        CallActivity::Failed | CallActivity::Cancelled => emit_event!(tracing::Level::WARN),
    }
}
