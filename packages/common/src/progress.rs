/// Percentage of a course's lectures a student has completed, rounded to two decimals.
///
/// Returns 0 for a course without lectures and never exceeds 100, even if the
/// lecture count shrank after the student watched some of them.
pub fn completion_percentage(watched_lectures: i32, total_videos: i32) -> f64 {
    if total_videos <= 0 || watched_lectures <= 0 {
        return 0.0;
    }
    let pct = 100.0 * f64::from(watched_lectures) / f64::from(total_videos);
    (pct.min(100.0) * 100.0).round() / 100.0
}

/// Whole-number form stored in the allocation's progress cache.
pub fn completion_percentage_floor(watched_lectures: i32, total_videos: i32) -> i32 {
    completion_percentage(watched_lectures, total_videos).floor() as i32
}
