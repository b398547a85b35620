//! Cosmetic build progress ramp.
//!
//! The ramp is purely presentational: it advances one slot per tick and has
//! no relation to the real step statuses.

/// Minimum number of slots so short builds still animate.
pub const MIN_RAMP_SLOTS: usize = 4;

/// Value shown for slot `index` of a ramp over `step_count` steps.
pub fn ramp_value(index: usize, step_count: usize) -> u8 {
    let total = step_count.max(MIN_RAMP_SLOTS);
    let value = ((index + 1) as f64 * 100.0 / total as f64).round();
    value.min(100.0) as u8
}

/// Every slot value of the ramp, in display order. The last value is 100.
pub fn ramp(step_count: usize) -> Vec<u8> {
    let total = step_count.max(MIN_RAMP_SLOTS);
    (0..total).map(|i| ramp_value(i, step_count)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_build_uses_four_slots() {
        assert_eq!(ramp(0), vec![25, 50, 75, 100]);
        assert_eq!(ramp(2), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(ramp(6), vec![17, 33, 50, 67, 83, 100]);
        assert_eq!(ramp_value(0, 7), 14);
    }

    #[test]
    fn test_ramp_is_monotonic_and_ends_at_100() {
        for n in 0..40 {
            let values = ramp(n);
            assert_eq!(values.len(), n.max(MIN_RAMP_SLOTS));
            assert_eq!(*values.last().unwrap(), 100);
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
