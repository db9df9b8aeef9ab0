//! Rendering of batch runtimes for reports and warnings.

use std::time::Duration;

/// Runtimes above this many seconds are rendered as `h:mm:ss`.
const CLOCK_FORMAT_AFTER_SECS: f64 = 60.0;

/// Whole hours, minutes and seconds of a duration (sub-second part truncated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakdown {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Breakdown {
    pub fn of(duration: Duration) -> Self {
        let total = duration.as_secs();
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

/// Format a batch runtime.
///
/// - more than 60 seconds: `"1hr:02min:05sec"`
/// - otherwise raw seconds: `"45 seconds"`, `"12.5 seconds"`
pub fn format_runtime(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs > CLOCK_FORMAT_AFTER_SECS {
        let Breakdown {
            hours,
            minutes,
            seconds,
        } = Breakdown::of(duration);
        format!("{hours}hr:{minutes:02}min:{seconds:02}sec")
    } else {
        format!("{secs} seconds")
    }
}
