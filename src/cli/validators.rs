//! CLI argument validators.

use crate::config::SkullStrip;
use crate::constants::threshold;
use std::time::Duration;

/// Parse and validate the segmentation threshold (0.0-1.0).
pub fn parse_threshold(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(threshold::MIN..=threshold::MAX).contains(&value) {
        return Err(format!(
            "threshold must be between {} and {}, got {value}",
            threshold::MIN,
            threshold::MAX
        ));
    }

    Ok(value)
}

/// Parse the skull stripping method (`bet`, `mass`, or empty for none).
pub fn parse_strip(s: &str) -> Result<SkullStrip, String> {
    s.parse()
}

/// Parse a duration such as `90s`, `30m`, `12h` or `2d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("'{s}' is not a valid duration (e.g. 30m, 12h, 2d)"))?;
    let scale = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => return Err(format!("unknown duration unit '{other}' (use s, m, h or d)")),
    };

    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
