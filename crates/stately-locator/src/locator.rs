use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::LocatorError;

/// The dependency a lookup asks for.
#[derive(Clone, Copy)]
pub struct DependencyKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl DependencyKey {
    pub fn of<D: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<D>(),
            type_name: type_name::<D>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn not_found(&self) -> LocatorError {
        LocatorError::DependencyNotFound {
            type_name: self.type_name,
        }
    }
}

impl PartialEq for DependencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for DependencyKey {}

impl Hash for DependencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DependencyKey({})", self.type_name)
    }
}

type Resolve = dyn Fn(DependencyKey) -> Result<Rc<dyn Any>, LocatorError>;

/// Type-indexed dependency lookup.
///
/// Matching is by exact type: a value provided as `u64` is not found when
/// `u32` is asked for, and a `Rc<dyn Trait>` is not found when one of its
/// implementors is asked for. Clones share the same resolution function.
#[derive(Clone)]
pub struct Locator {
    resolve: Rc<Resolve>,
}

impl Locator {
    pub fn from_fn(
        resolve: impl Fn(DependencyKey) -> Result<Rc<dyn Any>, LocatorError> + 'static,
    ) -> Self {
        Self {
            resolve: Rc::new(resolve),
        }
    }

    /// Finds nothing.
    pub fn empty() -> Self {
        Self::from_fn(|key| Err(key.not_found()))
    }

    /// Refuses every lookup; stands in for the resolver during `update`.
    pub(crate) fn forbidden() -> Self {
        Self::from_fn(|key| {
            Err(LocatorError::IllegalReadDuringUpdate {
                type_name: key.type_name(),
            })
        })
    }

    pub fn resolve(&self, key: DependencyKey) -> Result<Rc<dyn Any>, LocatorError> {
        (self.resolve)(key)
    }

    pub fn get<D: 'static>(&self) -> Result<Rc<D>, LocatorError> {
        let key = DependencyKey::of::<D>();
        self.resolve(key)?
            .downcast::<D>()
            .map_err(|_| key.not_found())
    }

    /// A locator answering `value` for `D` and deferring everything else to
    /// `self`.
    pub fn with_mock<D: 'static>(&self, value: D) -> Self {
        let previous = self.clone();
        let value: Rc<dyn Any> = Rc::new(value);
        let target = DependencyKey::of::<D>();
        Self::from_fn(move |key| {
            if key == target {
                Ok(value.clone())
            } else {
                previous.resolve(key)
            }
        })
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator").finish_non_exhaustive()
    }
}

/// Values keyed by their type, served as a [`Locator`].
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    entries: HashMap<DependencyKey, Rc<dyn Any>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide<D: 'static>(mut self, value: D) -> Self {
        self.insert(value);
        self
    }

    /// Registers `value`, replacing whatever was provided for `D` before.
    pub fn insert<D: 'static>(&mut self, value: D) -> bool {
        self.entries
            .insert(DependencyKey::of::<D>(), Rc::new(value))
            .is_some()
    }

    pub fn remove<D: 'static>(&mut self) -> bool {
        self.entries.remove(&DependencyKey::of::<D>()).is_some()
    }

    pub fn contains<D: 'static>(&self) -> bool {
        self.entries.contains_key(&DependencyKey::of::<D>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_locator(self) -> Locator {
        let entries = self.entries;
        Locator::from_fn(move |key| entries.get(&key).cloned().ok_or_else(|| key.not_found()))
    }
}

impl From<DependencyRegistry> for Locator {
    fn from(registry: DependencyRegistry) -> Self {
        registry.into_locator()
    }
}

impl fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
