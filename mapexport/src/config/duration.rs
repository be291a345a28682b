//! Human-readable durations for schedules (e.g., "1h30m", "2d").

use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration made of `<number><unit>` parts.
///
/// Units are `d`, `h`, `m` and `s`, case-insensitive. A bare number is
/// taken as seconds. Parts may repeat and appear in any order; whitespace
/// between them is ignored. A zero total is rejected.
///
/// ```
/// use mapexport::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(invalid());
    }

    if compact.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = compact.parse().map_err(|_| invalid())?;
        return non_zero(secs).ok_or_else(invalid);
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    for c in compact.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }

        let unit = match c.to_ascii_lowercase() {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let value: u64 = number.parse().map_err(|_| invalid())?;
        number.clear();

        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
    }

    if !number.is_empty() {
        return Err(invalid());
    }
    non_zero(total).ok_or_else(invalid)
}

fn non_zero(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Format a duration compactly, largest unit first (`1h30m`).
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
    }

    #[test]
    fn test_combined_units() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1d 2h").unwrap(), Duration::from_secs(93_600));
        assert_eq!(parse_duration("1H30M").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn test_bare_number_is_seconds() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_durations() {
        for input in ["", "h", "1x", "1h30", "0m", "-5m", "99999999999999999999d"] {
            assert_eq!(
                parse_duration(input),
                Err(ConfigError::InvalidDuration(input.to_string())),
                "{input}"
            );
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(86_401)), "1d1s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
