//! Debug assertion macros for the ring buffer protocols.
//!
//! Active only in debug builds, zero overhead in release. Shared by the
//! SPSC, MPSC and SPMC rings.

/// Assert that the item count never exceeds the ring capacity.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "ring count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

/// Assert that a sequence counter only moves forward.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "{} counter decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// Assert that the consumer never advances past the producer.
macro_rules! debug_assert_head_not_past_tail {
    ($new_head:expr, $tail:expr) => {
        debug_assert!(
            $new_head <= $tail,
            "head {} advanced beyond tail {}",
            $new_head,
            $tail
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_head_not_past_tail;
pub(crate) use debug_assert_monotonic;
