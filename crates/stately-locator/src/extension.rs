use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use stately_core::Lifecycle;

use crate::{Locator, LocatorError};

/// Dependency lookup attached to a notifier.
///
/// Holds the resolver a host installs and remembers whether the one-time
/// init phase already ran. It only sees its notifier through [`Lifecycle`]:
/// once the notifier is disposed, reading the resolver fails.
pub struct LocatorExtension {
    host: Box<dyn Lifecycle>,
    resolver: RefCell<Locator>,
    did_init: Cell<bool>,
}

impl LocatorExtension {
    pub fn new(host: impl Lifecycle + 'static, resolver: Locator) -> Self {
        Self {
            host: Box::new(host),
            resolver: RefCell::new(resolver),
            did_init: Cell::new(false),
        }
    }

    /// The current resolver. While `update` runs this is a resolver that
    /// refuses every read.
    pub fn resolver(&self) -> Result<Locator, LocatorError> {
        self.host.ensure_mounted()?;
        Ok(self.resolver.borrow().clone())
    }

    /// Installs the host's resolver, or a test double.
    pub fn set_resolver(&self, resolver: Locator) -> Result<(), LocatorError> {
        self.ensure_mounted()?;
        log::debug!("{}: resolver replaced", self.host.type_name());
        *self.resolver.borrow_mut() = resolver;
        Ok(())
    }

    /// Layers a mock over the current resolver: reads of exactly `D` return
    /// `value`, everything else falls through. Mocks stack.
    pub fn mock_dependency<D: 'static>(&self, value: D) -> Result<(), LocatorError> {
        let mocked = self.resolver()?.with_mock(value);
        self.set_resolver(mocked)
    }

    pub fn did_init(&self) -> bool {
        self.did_init.get()
    }

    pub fn mounted(&self) -> bool {
        self.host.mounted()
    }

    fn ensure_mounted(&self) -> Result<(), LocatorError> {
        Ok(self.host.ensure_mounted()?)
    }

    /// `true` exactly once, on the first call.
    fn begin_init(&self) -> bool {
        !self.did_init.replace(true)
    }

    fn forbid_reads(&self) -> ForbiddenReads<'_> {
        let saved = self.resolver.replace(Locator::forbidden());
        ForbiddenReads {
            extension: self,
            saved: Some(saved),
        }
    }
}

/// Puts the real resolver back when `update` returns or unwinds.
struct ForbiddenReads<'a> {
    extension: &'a LocatorExtension,
    saved: Option<Locator>,
}

impl Drop for ForbiddenReads<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.extension.resolver.borrow_mut() = saved;
        }
    }
}

impl fmt::Debug for LocatorExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorExtension")
            .field("host", &self.host.type_name())
            .field("mounted", &self.host.mounted())
            .field("did_init", &self.did_init.get())
            .finish()
    }
}

/// A type whose state depends on values pulled from a [`Locator`].
///
/// Implementors provide [`locator`](Self::locator) and override the hooks
/// they need. The host calls [`dispatch_update`](Self::dispatch_update)
/// whenever upstream dependencies change; the first call also runs
/// [`init_state`](Self::init_state).
pub trait Dependent {
    fn locator(&self) -> &LocatorExtension;

    /// Runs once, before the first `update`. Dependencies are read through
    /// [`read`](Self::read).
    fn init_state(&self) -> Result<(), LocatorError> {
        Ok(())
    }

    /// Runs every time upstream dependencies change. Dependencies must be
    /// read from `watch`; [`read`](Self::read) fails for the duration of the
    /// call.
    fn update(&self, _watch: &Locator) -> Result<(), LocatorError> {
        Ok(())
    }

    fn read<D: 'static>(&self) -> Result<Rc<D>, LocatorError>
    where
        Self: Sized,
    {
        self.locator().resolver()?.get::<D>()
    }

    fn dispatch_update(&self, watch: &Locator) -> Result<(), LocatorError> {
        init_once(self)?;
        update_with_reads_forbidden(self, watch)
    }

    /// Drives the lifecycle without a host, the way a host would. `watch`
    /// is the resolver as it stands after `init_state`.
    fn debug_update(&self) -> Result<(), LocatorError> {
        init_once(self)?;
        let watch = self.locator().resolver()?;
        update_with_reads_forbidden(self, &watch)
    }
}

fn init_once<D: Dependent + ?Sized>(dependent: &D) -> Result<(), LocatorError> {
    let extension = dependent.locator();
    extension.ensure_mounted()?;
    if extension.begin_init() {
        log::debug!("{}: init_state", extension.host.type_name());
        dependent.init_state()?;
    }
    Ok(())
}

fn update_with_reads_forbidden<D: Dependent + ?Sized>(
    dependent: &D,
    watch: &Locator,
) -> Result<(), LocatorError> {
    let extension = dependent.locator();
    extension.ensure_mounted()?;
    let _reads = extension.forbid_reads();
    dependent.update(watch)
}
