use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::lifecycle::{LifecycleState, Phase};

/// Convenient result alias for lifecycle_core.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Error type hooks may return. Anything `Error + Send + Sync` converts into it with `?`.
pub type HookError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of a single component hook.
pub type HookResult = std::result::Result<(), HookError>;

/// Log/handling importance. Maps onto `tracing` levels in [`log_error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    /// Refused requests; the component is left as it was.
    Warn,
    /// Hook failures.
    Error,
}

/// Stable error "kind" for matching/branching.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// A phase operation or guarded state write was refused.
    InvalidTransition,
    /// The engine was asked to do something its current situation forbids
    /// (e.g. a guarded state write outside any running phase).
    InvalidState,
    /// A hook, or the cleanup that followed it, failed. The cause is attached.
    HookFailed,
    Other,
}

/// Optional structured payload for rich context without forcing allocation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Payload {
    None,

    /// Refused transition: the state the engine was in and what was attempted
    /// (a target state label or the event identifier of the refused phase).
    Transition {
        from: LifecycleState,
        attempted: Cow<'static, str>,
    },

    /// The phase whose hook failed.
    Phase(Phase),
}

/// The one error type that crosses module boundaries in lifecycle_core.
#[derive(Debug, Error, Clone)]
#[error("{severity:?}: {message}")]
pub struct LifecycleError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: Cow<'static, str>,
    pub payload: Payload,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl LifecycleError {
    /// Fully-specified constructor (rarely needed at call sites).
    pub fn new(kind: ErrorKind, severity: Severity, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            payload: Payload::None,
            cause: None,
        }
    }

    // ---------------- Fluent entry points ----------------

    #[inline]
    pub fn warn() -> ErrB {
        ErrB::new(Severity::Warn)
    }
    #[inline]
    pub fn error() -> ErrB {
        ErrB::new(Severity::Error)
    }

    /// Refused transition out of `from`. `attempted` names the target state or
    /// the event identifier of the phase that was refused.
    pub fn invalid_transition(from: LifecycleState, attempted: impl Into<Cow<'static, str>>) -> Self {
        let attempted = attempted.into();
        LifecycleError::warn()
            .kind(ErrorKind::InvalidTransition)
            .msgf(format_args!("the lifecycle transitioned to invalid state {attempted}"))
            .payload(Payload::Transition { from, attempted })
            .build()
    }

    /// A hook (or the work the engine does around it) failed during `phase`.
    pub fn phase_failed(phase: Phase, cause: HookError) -> Self {
        let message = match phase {
            Phase::Init => "lifecycle initialization failed",
            Phase::Start => "the lifecycle failed to start",
            Phase::Stop => "failed to stop the lifecycle",
            Phase::Destroy => "failed to destroy the lifecycle",
        };
        LifecycleError::error()
            .kind(ErrorKind::HookFailed)
            .msg(message)
            .payload(Payload::Phase(phase))
            .cause(cause)
            .build()
    }

    /// Guarded state write attempted while no phase operation is running.
    pub fn not_in_phase(from: LifecycleState, attempted: LifecycleState) -> Self {
        LifecycleError::warn()
            .kind(ErrorKind::InvalidState)
            .msg("state can only be advanced while a phase operation is running")
            .payload(Payload::Transition {
                from,
                attempted: Cow::Borrowed(attempted.label()),
            })
            .build()
    }

    /// The wrapped error, if any, for downcasting to the hook's own error type.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

/// Fluent builder that behaves like iterator chains (takes self, returns Self).
/// Defaults:
/// - kind = Other
/// - message = ""
/// - payload = None
/// - cause = None
#[derive(Debug, Clone)]
pub struct ErrB {
    kind: ErrorKind,
    severity: Severity,
    message: Cow<'static, str>,
    payload: Payload,
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl ErrB {
    #[inline]
    fn new(severity: Severity) -> Self {
        Self {
            kind: ErrorKind::Other,
            severity,
            message: Cow::Borrowed(""),
            payload: Payload::None,
            cause: None,
        }
    }

    /// Set/override the kind (defaults to ErrorKind::Other).
    #[inline]
    pub fn kind(mut self, k: ErrorKind) -> Self {
        self.kind = k;
        self
    }

    /// Set/override the message (defaults to "").
    #[inline]
    pub fn msg(mut self, m: impl Into<Cow<'static, str>>) -> Self {
        self.message = m.into();
        self
    }

    /// Formatting-friendly message setter.
    #[inline]
    pub fn msgf(mut self, args: fmt::Arguments<'_>) -> Self {
        self.message = Cow::Owned(args.to_string());
        self
    }

    /// Only one payload: this replaces any previous payload (default is None).
    #[inline]
    pub fn payload(mut self, p: Payload) -> Self {
        self.payload = p;
        self
    }

    /// Attach the underlying error.
    #[inline]
    pub fn cause(mut self, cause: HookError) -> Self {
        self.cause = Some(Arc::from(cause));
        self
    }

    #[inline]
    pub fn build(self) -> LifecycleError {
        LifecycleError {
            kind: self.kind,
            severity: self.severity,
            message: self.message,
            payload: self.payload,
            cause: self.cause,
        }
    }
}

impl From<ErrB> for LifecycleError {
    fn from(b: ErrB) -> Self {
        b.build()
    }
}

/// Emit `err` through the `tracing` macro matching its severity.
pub fn log_error(err: &LifecycleError) {
    match err.severity {
        Severity::Warn => tracing::warn!(kind = ?err.kind, "{err}"),
        Severity::Error => tracing::error!(kind = ?err.kind, "{err}"),
    }
}
