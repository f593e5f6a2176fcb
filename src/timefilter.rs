//! Time-window helpers shared by extraction and splitting.

/// Fraction of the bag covered by an optional `[start, end]` window, all in
/// seconds. `None` when the bag has no positive duration.
pub fn filter_fraction(start: Option<f64>, end: Option<f64>, bag_start: f64, bag_end: f64) -> Option<f64> {
    let duration = bag_end - bag_start;
    if duration <= 0.0 {
        return None;
    }
    Some(match (start, end) {
        (Some(s), Some(e)) => (e - s) / duration,
        (Some(s), None) => (bag_end - s) / duration,
        (None, Some(e)) => (e - bag_start) / duration,
        (None, None) => 1.0,
    })
}

/// Returns `(in_range, past_end)` for a message time in nanoseconds. Both
/// bounds are inclusive; missing bounds are open.
pub fn is_message_within_time_range(time_ns: u64, start_ns: Option<u64>, end_ns: Option<u64>) -> (bool, bool) {
    if let Some(s) = start_ns && time_ns < s {
        return (false, false);
    }
    if let Some(e) = end_ns && time_ns > e {
        return (false, true);
    }
    (true, false)
}

pub fn offset_s_to_rosbag_ns(offset_s: f64, first_rosbag_time_ns: u64) -> u64 {
    let offset_ns = (offset_s * 1e9) as i128;
    (first_rosbag_time_ns as i128 + offset_ns).max(0) as u64
}
