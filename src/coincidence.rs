use num_traits::Signed;

/// Returns `true` if the two times are closer than `window`.
///
/// The comparison is strict: a time difference exactly equal to the window is
/// not a coincidence. A negative window never produces a coincidence.
///
/// # Examples
///
/// ```
/// use tof::coincidence::is_coincident;
///
/// assert!(is_coincident(100.0, 104.5, 5.0));
/// assert!(!is_coincident(100, 105, 5));
/// ```
pub fn is_coincident<T>(t_a: T, t_b: T, window: T) -> bool
where
    T: Signed + PartialOrd + Copy,
{
    (t_a - t_b).abs() < window
}

/// Convert a light-detector time in microseconds to nanoseconds and remove the
/// optical delay (also in nanoseconds).
pub fn light_time_ns(time_us: f64, optical_delay: f64) -> f64 {
    time_us * 1e3 - optical_delay
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincidence_is_symmetric() {
        assert!(is_coincident(10.0, 12.0, 3.0));
        assert!(is_coincident(12.0, 10.0, 3.0));
        assert!(!is_coincident(10.0, 14.0, 3.0));
        assert!(!is_coincident(14.0, 10.0, 3.0));
    }

    #[test]
    fn coincidence_window_edge() {
        assert!(!is_coincident(0, 10, 10));
        assert!(is_coincident(0, 9, 10));
        assert!(!is_coincident(0.0, -10.0, 10.0));
    }

    #[test]
    fn coincidence_negative_window() {
        assert!(!is_coincident(5, 5, -1));
        assert!(!is_coincident(5.0, 5.0, -0.1));
    }

    #[test]
    fn coincidence_zero_window() {
        assert!(!is_coincident(5.0, 5.0, 0.0));
    }

    #[test]
    fn light_time_conversion() {
        assert_eq!(light_time_ns(1.0, 0.0), 1000.0);
        assert_eq!(light_time_ns(1.0, 250.0), 750.0);
        assert_eq!(light_time_ns(-0.5, 10.0), -510.0);
    }
}
