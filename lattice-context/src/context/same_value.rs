//! Identity comparison for context values.
//!
//! Providers skip a broadcast entirely when the new value is the "same
//! value" as the old one. Sameness here is total and reflexive, which plain
//! `PartialEq` is not for floats:
//!
//! - `+0.0` and `-0.0` are different values.
//! - Every NaN is the same value as every other NaN.
//!
//! Shared pointers (`Rc`, `Arc`) compare by identity, not by contents, so a
//! provider holding an `Rc<State>` broadcasts whenever a new allocation is
//! supplied.

use std::rc::Rc;
use std::sync::Arc;

/// Total, reflexive identity comparison.
pub trait SameValue {
    /// Returns true if `self` and `other` are the same value.
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                #[inline]
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, String, str,
    &'static str,
);

macro_rules! same_value_float {
    ($($ty:ty),*) => {
        $(
            impl SameValue for $ty {
                #[inline]
                fn same_value(&self, other: &Self) -> bool {
                    if self.is_nan() && other.is_nan() {
                        return true;
                    }
                    self.to_bits() == other.to_bits()
                }
            }
        )*
    };
}

same_value_float!(f32, f64);

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for [T] {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SameValue for Arc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

macro_rules! same_value_tuple {
    ($(($($name:ident : $idx:tt),+)),* $(,)?) => {
        $(
            impl<$($name: SameValue),+> SameValue for ($($name,)+) {
                fn same_value(&self, other: &Self) -> bool {
                    $(self.$idx.same_value(&other.$idx))&&+
                }
            }
        )*
    };
}

same_value_tuple!(
    (A: 0),
    (A: 0, B: 1),
    (A: 0, B: 1, C: 2),
    (A: 0, B: 1, C: 2, D: 3),
);
