//! # Locators
//!
//! A notifier sometimes derives its state from values owned elsewhere: a
//! repository, a clock, another notifier. Instead of taking them as
//! constructor arguments, it pulls them from a [`Locator`], a type-indexed
//! lookup installed by whatever hosts the notifier.
//!
//! - [`LocatorExtension`] sits next to the notifier and holds the resolver.
//! - [`Dependent`] is implemented by the owner and provides the hooks:
//!   `init_state` runs once, `update` runs whenever dependencies change.
//! - [`DependencyRegistry`] is the simplest resolver a host can install.
//!
//! ```rust
//! use stately_core::*;
//! use stately_locator::*;
//!
//! struct Step(i32);
//!
//! struct Counter {
//!     notifier: StateNotifier<i32>,
//!     locator: LocatorExtension,
//! }
//!
//! impl Dependent for Counter {
//!     fn locator(&self) -> &LocatorExtension {
//!         &self.locator
//!     }
//!
//!     fn init_state(&self) -> Result<(), LocatorError> {
//!         let step = self.read::<Step>()?;
//!         Ok(self.notifier.set_state(step.0)?)
//!     }
//!
//!     fn update(&self, watch: &Locator) -> Result<(), LocatorError> {
//!         let step = watch.get::<Step>()?;
//!         Ok(self.notifier.update(|v| v + step.0)?)
//!     }
//! }
//!
//! let notifier = StateNotifier::new(0);
//! let counter = Counter {
//!     locator: LocatorExtension::new(notifier.listenable(), Locator::empty()),
//!     notifier,
//! };
//! counter.locator.mock_dependency(Step(5))?;
//!
//! counter.debug_update()?; // init: 5, update: 10
//! counter.debug_update()?; // update: 15
//! assert_eq!(counter.notifier.state()?, 15);
//! # Ok::<(), LocatorError>(())
//! ```

pub mod error;
pub mod extension;
pub mod locator;

pub use error::LocatorError;
pub use extension::{Dependent, LocatorExtension};
pub use locator::{DependencyKey, DependencyRegistry, Locator};
