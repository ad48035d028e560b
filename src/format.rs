/// Format whole seconds as `"MM min SS sec"`, or `"H h MM min"` from one hour up
pub fn format_duration(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hrs > 0 {
        format!("{} h {:02} min", hrs, mins)
    } else {
        format!("{:02} min {:02} sec", mins, secs)
    }
}

/// Format kilometers with two decimals
pub fn format_distance(km: f64) -> String {
    format!("{:.2} km", km)
}
