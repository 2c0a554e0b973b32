use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::StateListenable;

#[derive(Debug, Error)]
pub enum StateError {
    /// Any operation other than `mounted` after `dispose`.
    #[error("tried to use {type_name} after `dispose` was called")]
    UseAfterDispose { type_name: &'static str },

    /// A listener tried to subscribe while listeners were being notified.
    #[error("cannot add a listener while a notification is in progress")]
    ReentrantRegistration,

    /// The listener failed when `subscribe` fired it with the current state.
    /// It was not left registered.
    #[error("listener failed when fired with the current state: {0}")]
    Listener(ListenerFailure),

    /// One or more listeners failed during a notification pass.
    #[error(transparent)]
    Listeners(#[from] ListenerErrors),
}

/// One failed listener call: the error and where it was observed.
#[derive(Debug)]
pub struct ListenerFailure {
    error: anyhow::Error,
    backtrace: Backtrace,
}

impl ListenerFailure {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };
        Self::new(anyhow::anyhow!("listener panicked: {message}"))
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn into_error(self) -> anyhow::Error {
        self.error
    }
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl std::error::Error for ListenerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Every listener failure of a single notification pass, in registration
/// order, plus the notifier whose assignment triggered the pass.
///
/// Each failure has already been handed to the notifier's error handler (or
/// the ambient sink) by the time this error reaches the caller.
pub struct ListenerErrors {
    failures: Vec<ListenerFailure>,
    notifier: Rc<dyn Any>,
    notifier_type: &'static str,
}

impl ListenerErrors {
    pub(crate) fn new<T: 'static>(
        failures: Vec<ListenerFailure>,
        notifier: StateListenable<T>,
    ) -> Self {
        Self {
            failures,
            notifier: Rc::new(notifier),
            notifier_type: std::any::type_name::<T>(),
        }
    }

    pub fn failures(&self) -> &[ListenerFailure] {
        &self.failures
    }

    pub fn errors(&self) -> impl Iterator<Item = &anyhow::Error> {
        self.failures.iter().map(ListenerFailure::error)
    }

    pub fn into_failures(self) -> Vec<ListenerFailure> {
        self.failures
    }

    /// The notifier that was being updated, if its state type is `T`.
    pub fn notifier<T: 'static>(&self) -> Option<&StateListenable<T>> {
        self.notifier.downcast_ref::<StateListenable<T>>()
    }
}

impl fmt::Debug for ListenerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerErrors")
            .field("notifier", &format_args!("StateNotifier<{}>", self.notifier_type))
            .field("failures", &self.failures)
            .finish()
    }
}

impl fmt::Display for ListenerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listener(s) of StateNotifier<{}> failed while the state was updated:",
            self.failures.len(),
            self.notifier_type
        )?;
        for failure in &self.failures {
            write!(f, "\n  - {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ListenerErrors {}
