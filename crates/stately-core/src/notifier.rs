use std::any::type_name;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::error::{ListenerErrors, ListenerFailure, StateError};
use crate::identity::Identical;
use crate::listeners::{Listener, ListenerKey, ListenerList, RemoveListener};
use crate::sink;
#[cfg(feature = "stream")]
use crate::stream::{StateStream, StreamHub};

pub type ErrorHandler = Rc<dyn Fn(&anyhow::Error, &Backtrace)>;

type ShouldNotify<T> = Box<dyn Fn(&T, &T) -> bool>;

struct Inner<T> {
    state: RefCell<T>,
    listeners: RefCell<ListenerList<T>>,
    error_handler: RefCell<Option<ErrorHandler>>,
    should_notify: ShouldNotify<T>,
    mounted: Cell<bool>,
    /// Number of notification passes on the stack. Nested assignment from a
    /// listener opens a pass inside a pass.
    notify_depth: Cell<usize>,
    #[cfg(feature = "stream")]
    streams: StreamHub<T>,
}

/// Marks a notification pass for as long as it lives.
struct NotifyPass<'a>(&'a Cell<usize>);

impl<'a> NotifyPass<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for NotifyPass<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

fn invoke<T>(listener: &Listener<T>, value: &T) -> Result<(), ListenerFailure> {
    match catch_unwind(AssertUnwindSafe(|| listener(value))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(ListenerFailure::new(error)),
        Err(payload) => Err(ListenerFailure::from_panic(payload)),
    }
}

impl<T: 'static> Inner<T> {
    fn ensure_mounted(&self) -> Result<(), StateError> {
        if self.mounted.get() {
            Ok(())
        } else {
            Err(StateError::UseAfterDispose {
                type_name: type_name::<StateNotifier<T>>(),
            })
        }
    }

    fn report(&self, failure: &ListenerFailure) {
        let handler = self.error_handler.borrow().clone();
        match handler {
            Some(handler) => handler(failure.error(), failure.backtrace()),
            None => sink::report_error(failure.error(), failure.backtrace()),
        }
    }

    fn has_listeners(&self) -> Result<bool, StateError> {
        self.ensure_mounted()?;
        Ok(!self.listeners.borrow().is_empty())
    }

    fn listener_count(&self) -> Result<usize, StateError> {
        self.ensure_mounted()?;
        Ok(self.listeners.borrow().len())
    }

    fn dispose(&self) -> Result<(), StateError> {
        self.ensure_mounted()?;
        log::debug!("disposing {}", type_name::<StateNotifier<T>>());
        // Dropped outside the borrow: a listener's captures may reach back in.
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        self.mounted.set(false);
        drop(listeners);
        #[cfg(feature = "stream")]
        self.streams.close();
        Ok(())
    }
}

impl<T: Clone + 'static> Inner<T> {
    fn subscribe(
        self: &Rc<Self>,
        listener: Listener<T>,
        fire_immediately: bool,
    ) -> Result<RemoveListener, StateError> {
        if self.notify_depth.get() > 0 {
            return Err(StateError::ReentrantRegistration);
        }
        self.ensure_mounted()?;

        let key = self.listeners.borrow_mut().push_back(listener.clone());

        if fire_immediately {
            let value = self.state.borrow().clone();
            let outcome = {
                let _pass = NotifyPass::enter(&self.notify_depth);
                invoke(&listener, &value)
            };
            if let Err(failure) = outcome {
                self.listeners.borrow_mut().remove(key);
                log::warn!(
                    "listener of {} failed on its first call and was not added",
                    type_name::<StateNotifier<T>>()
                );
                self.report(&failure);
                return Err(StateError::Listener(failure));
            }
        }

        Ok(self.remover(key))
    }

    fn remover(self: &Rc<Self>, key: ListenerKey) -> RemoveListener {
        let inner = Rc::downgrade(self);
        RemoveListener::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.listeners.borrow_mut().remove(key);
            }
        })
    }
}

/// An observable single value.
///
/// This is the owner's handle: it can read and assign the state. Owners keep
/// it in a private field and hand out [`StateListenable`]s (see
/// [`listenable`](Self::listenable)) to everyone that only needs to observe.
/// Clones share the same state, listeners and lifecycle.
///
/// # Notification
///
/// [`set_state`](Self::set_state) always stores the new value, then asks the
/// update predicate whether listeners should hear about it. The default
/// predicate (see [`StateNotifier::new`]) is *not identical*, which is
/// reference identity and not structural equality.
///
/// Listeners run synchronously, in registration order, each with a clone of
/// the value that triggered the pass. A failing listener (an `Err` or a
/// panic) does not stop the pass. Every failure is reported to the error
/// handler, or to the [ambient sink](crate::sink) if there is none, and then
/// the assignment itself fails with [`StateError::Listeners`].
///
/// Listeners may assign the state again (the nested pass runs to completion
/// before the outer one continues), but may not subscribe.
pub struct StateNotifier<T> {
    inner: Rc<Inner<T>>,
}

/// Observer's handle to a [`StateNotifier`]: everything except reading and
/// assigning the state.
pub struct StateListenable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for StateNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Clone for StateListenable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Identical + Clone + 'static> StateNotifier<T> {
    /// Creates a mounted notifier holding `initial`, notifying whenever an
    /// assigned value is not [identical](Identical) to the previous one.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_update_should_notify(initial, |old, new| !old.identical(new))
    }
}

impl<T: Clone + 'static> StateNotifier<T> {
    /// Creates a mounted notifier with a custom update predicate.
    ///
    /// `should_notify(old, new)` decides whether an assignment notifies; the
    /// stored value changes either way.
    #[must_use]
    pub fn with_update_should_notify(
        initial: T,
        should_notify: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(initial),
                listeners: RefCell::new(ListenerList::default()),
                error_handler: RefCell::new(None),
                should_notify: Box::new(should_notify),
                mounted: Cell::new(true),
                notify_depth: Cell::new(0),
                #[cfg(feature = "stream")]
                streams: StreamHub::default(),
            }),
        }
    }

    pub fn listenable(&self) -> StateListenable<T> {
        StateListenable {
            inner: Rc::clone(&self.inner),
        }
    }

    /// A clone of the current state.
    pub fn state(&self) -> Result<T, StateError> {
        self.inner.ensure_mounted()?;
        Ok(self.inner.state.borrow().clone())
    }

    /// Stores `value` and, if the update predicate agrees, notifies streams
    /// and listeners.
    ///
    /// Fails with [`StateError::Listeners`] after the pass if any listener
    /// failed; the value is stored regardless.
    pub fn set_state(&self, value: T) -> Result<(), StateError> {
        let inner = &self.inner;
        inner.ensure_mounted()?;

        let notify = {
            let old = inner.state.borrow();
            (inner.should_notify)(&*old, &value)
        };
        let notified = notify.then(|| value.clone());
        let previous = inner.state.replace(value);
        drop(previous);

        let Some(value) = notified else {
            log::trace!(
                "{}: state replaced without notification",
                type_name::<Self>()
            );
            return Ok(());
        };

        #[cfg(feature = "stream")]
        inner.streams.broadcast(&value);

        let failures = {
            let _pass = NotifyPass::enter(&inner.notify_depth);
            let snapshot = inner.listeners.borrow().snapshot();
            log::trace!(
                "{}: notifying {} listener(s)",
                type_name::<Self>(),
                snapshot.len()
            );
            let mut failures = Vec::new();
            for (key, listener) in snapshot {
                // Removed by an earlier listener of this pass.
                if !inner.listeners.borrow().contains(key) {
                    continue;
                }
                if let Err(failure) = invoke(&listener, &value) {
                    failures.push(failure);
                }
            }
            for failure in &failures {
                inner.report(failure);
            }
            failures
        };

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ListenerErrors::new(failures, self.listenable()).into())
        }
    }

    /// Assigns `f(&current)` through [`set_state`](Self::set_state).
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<(), StateError> {
        let current = self.state()?;
        self.set_state(f(&current))
    }

    /// Subscribes `listener` and calls it once with the current state.
    pub fn subscribe(
        &self,
        listener: impl Fn(&T) -> anyhow::Result<()> + 'static,
    ) -> Result<RemoveListener, StateError> {
        self.inner.subscribe(Rc::new(listener), true)
    }

    /// See [`StateListenable::subscribe_with`].
    pub fn subscribe_with(
        &self,
        listener: impl Fn(&T) -> anyhow::Result<()> + 'static,
        fire_immediately: bool,
    ) -> Result<RemoveListener, StateError> {
        self.inner.subscribe(Rc::new(listener), fire_immediately)
    }

    #[cfg(feature = "stream")]
    pub fn stream(&self) -> Result<StateStream<T>, StateError> {
        self.inner.ensure_mounted()?;
        Ok(self.inner.streams.subscribe())
    }

    pub fn has_listeners(&self) -> Result<bool, StateError> {
        self.inner.has_listeners()
    }

    pub fn listener_count(&self) -> Result<usize, StateError> {
        self.inner.listener_count()
    }

    pub fn mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn dispose(&self) -> Result<(), StateError> {
        self.inner.dispose()
    }

    /// Routes listener failures to `handler` instead of the ambient sink.
    pub fn set_error_handler(
        &self,
        handler: impl Fn(&anyhow::Error, &Backtrace) + 'static,
    ) -> Result<(), StateError> {
        self.inner.ensure_mounted()?;
        *self.inner.error_handler.borrow_mut() = Some(Rc::new(handler));
        Ok(())
    }

    pub fn clear_error_handler(&self) -> Result<(), StateError> {
        self.inner.ensure_mounted()?;
        self.inner.error_handler.borrow_mut().take();
        Ok(())
    }
}

impl<T: Clone + 'static> StateListenable<T> {
    /// Subscribes `listener` and calls it once with the current state.
    pub fn subscribe(
        &self,
        listener: impl Fn(&T) -> anyhow::Result<()> + 'static,
    ) -> Result<RemoveListener, StateError> {
        self.inner.subscribe(Rc::new(listener), true)
    }

    /// Appends `listener` to the registry, optionally calling it once with
    /// the current state.
    ///
    /// Registering the same closure twice yields two independent entries.
    /// If the immediate call fails, the listener is removed again, the
    /// failure is reported, and it is returned as [`StateError::Listener`].
    /// Fails with [`StateError::ReentrantRegistration`] when called from a
    /// listener.
    pub fn subscribe_with(
        &self,
        listener: impl Fn(&T) -> anyhow::Result<()> + 'static,
        fire_immediately: bool,
    ) -> Result<RemoveListener, StateError> {
        self.inner.subscribe(Rc::new(listener), fire_immediately)
    }

    /// A stream of every state notified from now on. Ends on `dispose`.
    #[cfg(feature = "stream")]
    pub fn stream(&self) -> Result<StateStream<T>, StateError> {
        self.inner.ensure_mounted()?;
        Ok(self.inner.streams.subscribe())
    }

    pub fn has_listeners(&self) -> Result<bool, StateError> {
        self.inner.has_listeners()
    }

    pub fn listener_count(&self) -> Result<usize, StateError> {
        self.inner.listener_count()
    }

    pub fn mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Clears every listener, ends every stream and unmounts the notifier.
    /// Disposing twice is an error.
    pub fn dispose(&self) -> Result<(), StateError> {
        self.inner.dispose()
    }

    /// Reads the state from outside its owner.
    #[cfg(any(test, feature = "testing"))]
    #[deprecated(note = "observe the state through `subscribe` instead")]
    pub fn debug_state(&self) -> Result<T, StateError> {
        self.inner.ensure_mounted()?;
        Ok(self.inner.state.borrow().clone())
    }
}

/// Narrow view of a notifier's lifecycle, for capabilities that live next to
/// a notifier and must stop working once it is disposed.
pub trait Lifecycle {
    fn mounted(&self) -> bool;

    /// Name used in [`StateError::UseAfterDispose`].
    fn type_name(&self) -> &'static str;

    fn ensure_mounted(&self) -> Result<(), StateError> {
        if self.mounted() {
            Ok(())
        } else {
            Err(StateError::UseAfterDispose {
                type_name: self.type_name(),
            })
        }
    }
}

impl<T: 'static> Lifecycle for StateNotifier<T> {
    fn mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    fn type_name(&self) -> &'static str {
        type_name::<StateNotifier<T>>()
    }
}

impl<T: 'static> Lifecycle for StateListenable<T> {
    fn mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    fn type_name(&self) -> &'static str {
        type_name::<StateNotifier<T>>()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateNotifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("StateNotifier")
            .field("state", &inner.state.try_borrow().ok())
            .field("mounted", &inner.mounted.get())
            .field(
                "listeners",
                &inner.listeners.try_borrow().map(|l| l.len()).ok(),
            )
            .finish()
    }
}

impl<T> fmt::Debug for StateListenable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateListenable")
            .field("type", &type_name::<T>())
            .field("mounted", &self.inner.mounted.get())
            .finish_non_exhaustive()
    }
}
