//! Microsecond timestamps for boundary stamping and logging.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

/// Monotonic microseconds since the first call in this process. Suitable
/// for latency deltas; never goes backwards.
pub fn monotonic_micros() -> u64 {
    anchor().elapsed().as_micros() as u64
}

/// Wall-clock microseconds since the unix epoch.
pub fn wall_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as u64)
}

/// Formats a wall-clock microsecond stamp as `HH:MM:SS.uuuuuu` UTC
/// time-of-day, the shape log lines want.
pub fn format_micros(stamp: u64) -> String {
    let secs_of_day = (stamp / 1_000_000) % 86_400;
    let micros = stamp % 1_000_000;
    format!(
        "{:02}:{:02}:{:02}.{:06}",
        secs_of_day / 3600,
        (secs_of_day / 60) % 60,
        secs_of_day % 60,
        micros
    )
}
