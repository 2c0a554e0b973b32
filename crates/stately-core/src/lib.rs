//! # State notifiers
//!
//! Stately keeps one piece of state in an observable container and pushes
//! every change to the listeners registered on it. There are three main
//! pieces:
//!
//! - `StateNotifier<T>`: the owner's handle, which reads and assigns the state.
//! - `StateListenable<T>`: the observer's handle, which subscribes, inspects and
//!   disposes, but never assigns.
//! - the ambient error sink: where listener failures go when a notifier
//!   has no error handler of its own.
//!
//! ## Notifying
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use stately_core::*;
//!
//! let counter = StateNotifier::new(0);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let remove = counter.subscribe({
//!     let seen = seen.clone();
//!     move |v: &i32| {
//!         seen.borrow_mut().push(*v);
//!         Ok(())
//!     }
//! })?;
//!
//! counter.set_state(1)?;
//! remove.remove();
//! counter.set_state(2)?;
//!
//! // Fired once on subscribe, once for `1`, never for `2`.
//! assert_eq!(*seen.borrow(), vec![0, 1]);
//!
//! counter.dispose()?;
//! assert!(counter.state().is_err());
//! # Ok::<(), StateError>(())
//! ```
//!
//! ## Owning a notifier
//!
//! The setter is not access-controlled at runtime. A type that owns a piece
//! of state keeps its `StateNotifier` private and hands out listenables:
//!
//! ```rust
//! use stately_core::*;
//!
//! pub struct Todos {
//!     notifier: StateNotifier<std::rc::Rc<Vec<String>>>,
//! }
//!
//! impl Todos {
//!     pub fn new() -> Self {
//!         Self { notifier: StateNotifier::new(Default::default()) }
//!     }
//!
//!     pub fn add(&self, todo: &str) -> Result<(), StateError> {
//!         self.notifier.update(|todos| {
//!             let mut next = Vec::clone(todos);
//!             next.push(todo.to_string());
//!             std::rc::Rc::new(next)
//!         })
//!     }
//!
//!     pub fn listenable(&self) -> StateListenable<std::rc::Rc<Vec<String>>> {
//!         self.notifier.listenable()
//!     }
//! }
//!
//! let todos = Todos::new();
//! todos.add("write docs")?;
//! assert_eq!(todos.listenable().listener_count()?, 0);
//! # Ok::<(), StateError>(())
//! ```
//!
//! ## Filtering updates
//!
//! By default an assignment notifies unless the new value is
//! [identical](Identical) to the old one, which is reference identity for
//! shared pointers. Use [`StateNotifier::with_update_should_notify`] for any
//! other rule. Either way the stored value always changes.
//!
//! ## Failures
//!
//! A listener fails by returning `Err` or by panicking. The pass goes on,
//! each failure is reported, and the assignment returns
//! [`StateError::Listeners`] carrying all of them in registration order.

pub mod error;
pub mod identity;
pub mod listeners;
pub mod notifier;
pub mod prelude;
pub mod sink;
#[cfg(feature = "stream")]
pub mod stream;

pub use error::*;
pub use identity::*;
pub use listeners::{Listener, ListenerKey, RemoveListener};
pub use notifier::*;
pub use sink::*;
#[cfg(feature = "stream")]
pub use stream::StateStream;
