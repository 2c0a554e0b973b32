use std::rc::{self, Rc};
use std::sync::{self, Arc};

/// Reference identity, the default "did the state change?" test.
///
/// `StateNotifier::new` notifies listeners only when the new state is not
/// identical to the old one. Identity is deliberately not structural
/// equality: comparing large states field by field on every assignment is
/// expensive, and owners rarely assign the very same instance back.
///
/// Shared pointers compare by address. Scalars have no identity apart from
/// their value, so they compare by value (floats by bit pattern). Types
/// without a meaningful identity do not implement this trait; wrap them in
/// an `Rc` or build the notifier with a custom predicate instead.
pub trait Identical {
    fn identical(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identical for Rc<T> {
    fn identical(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identical for Arc<T> {
    fn identical(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identical for rc::Weak<T> {
    fn identical(&self, other: &Self) -> bool {
        rc::Weak::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identical for sync::Weak<T> {
    fn identical(&self, other: &Self) -> bool {
        sync::Weak::ptr_eq(self, other)
    }
}

impl Identical for &'static str {
    fn identical(&self, other: &Self) -> bool {
        std::ptr::eq(*self, *other)
    }
}

impl<T: Identical> Identical for Option<T> {
    fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.identical(b),
            (None, None) => true,
            _ => false,
        }
    }
}

macro_rules! identical_by_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl Identical for $t {
                #[inline]
                fn identical(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

identical_by_value!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
);

impl Identical for f32 {
    fn identical(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Identical for f64 {
    fn identical(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}
