//! Elapsed-duration text carried in the footer of ended cards.
//!
//! Rendered truncated to whole minutes: `"1h5m"`, `"45m"`, or empty under a
//! minute. Parsing accepts any run of `<int><unit>` groups with units
//! `h`, `m`, `s`, so legacy `"1h5m0s"` footers still decode.

use std::fmt;

use chrono::Duration;

/// Render `d` truncated to minutes. Negative durations render as empty.
pub fn format_elapsed(d: Duration) -> String {
    let minutes = d.num_minutes();
    if minutes <= 0 {
        return String::new();
    }
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{h}h{m}m")
    } else {
        format!("{m}m")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElapsedParseError {
    pub input: String,
    pub reason: &'static str,
}

impl fmt::Display for ElapsedParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid elapsed text {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for ElapsedParseError {}

/// Parse footer text back into a duration. Empty text is zero.
pub fn parse_elapsed(text: &str) -> Result<Duration, ElapsedParseError> {
    let t = text.trim();
    let err = |reason| ElapsedParseError {
        input: text.to_string(),
        reason,
    };

    let mut total = Duration::zero();
    let mut digits = String::new();
    for c in t.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(err("unit without a number"));
        }
        let n: i64 = digits.parse().map_err(|_| err("number out of range"))?;
        digits.clear();
        let part = match c {
            'h' => Duration::try_hours(n),
            'm' => Duration::try_minutes(n),
            's' => Duration::try_seconds(n),
            _ => return Err(err("unknown unit")),
        }
        .ok_or_else(|| err("number out of range"))?;
        total = total
            .checked_add(&part)
            .ok_or_else(|| err("number out of range"))?;
    }
    if !digits.is_empty() {
        return Err(err("number without a unit"));
    }
    Ok(total)
}

/// `serde(with = ...)` helper storing a duration as whole seconds.
pub mod serde_secs {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(d)?;
        Duration::try_seconds(secs).ok_or_else(|| D::Error::custom("elapsed seconds out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_truncated_to_minutes() {
        assert_eq!(format_elapsed(Duration::seconds(59)), "");
        assert_eq!(format_elapsed(Duration::seconds(45 * 60 + 59)), "45m");
        assert_eq!(format_elapsed(Duration::minutes(65)), "1h5m");
        assert_eq!(format_elapsed(Duration::minutes(120)), "2h0m");
        assert_eq!(format_elapsed(Duration::minutes(-3)), "");
    }

    #[test]
    fn parses_rendered_and_legacy_forms() {
        assert_eq!(parse_elapsed("").unwrap(), Duration::zero());
        assert_eq!(parse_elapsed("45m").unwrap(), Duration::minutes(45));
        assert_eq!(parse_elapsed("1h5m").unwrap(), Duration::minutes(65));
        assert_eq!(parse_elapsed("1h5m0s").unwrap(), Duration::minutes(65));
        assert_eq!(parse_elapsed(" 2h0m ").unwrap(), Duration::minutes(120));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_elapsed("soon").is_err());
        assert!(parse_elapsed("12").is_err());
        assert!(parse_elapsed("3d").is_err());
        assert!(parse_elapsed("m5").is_err());
    }
}
