//! Changed-bits and observed-bits masks.
//!
//! A comparator describes *what* changed between two context values as a
//! bitmask, and each consumer declares which of those bits it cares about.
//! A consumer re-renders only when the two masks intersect.
//!
//! Both masks live in the low 30 bits of an integer, which is the largest
//! all-ones value that fits in a 31-bit signed small integer. Comparators
//! return a wide `i64` so that out-of-range results can be detected and
//! reported instead of silently wrapping.

/// The all-bits sentinel: every aspect changed, or every aspect observed.
pub const MAX_SIGNED_31_BIT_INT: u32 = 1_073_741_823;

/// A coerced changed-bits mask, as delivered to listeners.
pub type ChangedBits = u32;

/// A coerced observed-bits mask, as held by a consumer.
pub type ObservedBits = u32;

/// Returns true if `raw` is representable in the mask without truncation.
pub fn fits(raw: i64) -> bool {
    raw & i64::from(MAX_SIGNED_31_BIT_INT) == raw
}

/// Truncate a raw comparator or configuration value to the mask width.
///
/// Negative values keep their low bits, so `-1` becomes the all-bits
/// sentinel.
pub fn coerce(raw: i64) -> u32 {
    (raw & i64::from(MAX_SIGNED_31_BIT_INT)) as u32
}

/// Resolve an optional observed-bits setting. Absent means "observe
/// everything".
pub fn observed_or_all(setting: Option<i64>) -> ObservedBits {
    setting.map(coerce).unwrap_or(MAX_SIGNED_31_BIT_INT)
}

/// The gating rule: does a broadcast with `changed` concern a consumer
/// observing `observed`?
pub fn intersects(observed: ObservedBits, changed: ChangedBits) -> bool {
    observed & changed != 0
}
