//! Process-wide runtime switches.
//!
//! These flags are set once at startup (the binary maps its global options
//! onto them) and read when a stage is constructed, never per record.

use std::sync::atomic::{AtomicBool, Ordering};

/// When set, order-sensitive operators check their input is coordinate-ordered.
static VALIDATE_ORDER: AtomicBool = AtomicBool::new(false);

/// When set, zero-length BED intervals are widened to 1bp while reading.
static EXTEND_ZERO_LENGTH: AtomicBool = AtomicBool::new(false);

/// Enable or disable input order validation for fusion, cobble and unroll.
///
/// Validation costs one comparison per record and turns a silent
/// precondition violation into a [`FeatureError::OrderViolation`].
///
/// [`FeatureError::OrderViolation`]: crate::error::FeatureError::OrderViolation
///
/// # Example
///
/// ```
/// use gfstream::config;
///
/// config::set_validate_order(true);
/// assert!(config::is_validate_order());
/// config::set_validate_order(false);
/// ```
#[inline]
pub fn set_validate_order(enabled: bool) {
    VALIDATE_ORDER.store(enabled, Ordering::Release);
}

#[inline]
pub fn is_validate_order() -> bool {
    VALIDATE_ORDER.load(Ordering::Acquire)
}

/// Enable or disable widening of zero-length BED intervals (`start == end`).
#[inline]
pub fn set_extend_zero_length(enabled: bool) {
    EXTEND_ZERO_LENGTH.store(enabled, Ordering::Release);
}

#[inline]
pub fn is_extend_zero_length() -> bool {
    EXTEND_ZERO_LENGTH.load(Ordering::Acquire)
}

/// End coordinate after applying the zero-length policy.
#[inline]
pub fn normalize_end(start: i64, end: i64) -> i64 {
    if start == end && is_extend_zero_length() {
        start + 1
    } else {
        end
    }
}
