//! Rendering of timestep integers as lookup keys into the lineage source.

use crate::types::Timestep;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Zero-padded decimal key, e.g. width 3 renders `4` as `"004"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepKeyFormat {
    pub width: usize,
}

impl Default for TimestepKeyFormat {
    fn default() -> Self {
        Self { width: 3 }
    }
}

impl TimestepKeyFormat {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Render a timestep as a key.
    pub fn render(&self, timestep: Timestep) -> String {
        format!("{:0width$}", timestep, width = self.width)
    }

    /// Parse a key back into a timestep. Any decimal string is accepted,
    /// so keys written with a different padding still resolve.
    pub fn parse_key(&self, key: &str) -> Option<Timestep> {
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        key.parse().ok()
    }
}

impl FromStr for TimestepKeyFormat {
    type Err = String;

    /// Accepts a bare width (`"3"`, `"03"`) or a format string (`"{:03}"`,
    /// `"{0:03d}"`, `"{0:d}"`). A format string without a leading `0` in its
    /// width pads with spaces, which no key uses, so it is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = match trimmed.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            Some(body) => {
                let (_, pattern) = body
                    .split_once(':')
                    .ok_or_else(|| format!("key format '{}' has no ':' width", s))?;
                let pattern = pattern.strip_suffix('d').unwrap_or(pattern);
                if pattern.is_empty() {
                    return Ok(Self { width: 0 });
                }
                pattern
                    .strip_prefix('0')
                    .ok_or_else(|| format!("key format '{}': width must be zero-padded", s))?
            }
            None => trimmed,
        };

        if digits.is_empty() && trimmed.starts_with('{') {
            return Err(format!("key format '{}': missing width", s));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) || trimmed.is_empty() {
            return Err(format!("key format '{}': expected a zero-padded width", s));
        }
        let digits = digits.trim_start_matches('0');
        let width = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|e| format!("key format '{}': {}", s, e))?
        };
        Ok(Self { width })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_digits() {
        assert_eq!(TimestepKeyFormat::default().render(4), "004");
        assert_eq!(TimestepKeyFormat::default().render(1234), "1234");
    }

    #[test]
    fn test_parse_formats() {
        for text in ["3", "03", "{:03}", "{0:03d}"] {
            let format: TimestepKeyFormat = text.parse().unwrap();
            assert_eq!(format.width, 3, "format {}", text);
        }
        let unpadded: TimestepKeyFormat = "{0:d}".parse().unwrap();
        assert_eq!(unpadded.render(4), "4");
        assert!("{0:x}".parse::<TimestepKeyFormat>().is_err());
        assert!("abc".parse::<TimestepKeyFormat>().is_err());
    }

    #[test]
    fn test_space_padded_format_rejected() {
        assert!("{0:3d}".parse::<TimestepKeyFormat>().is_err());
        assert!("{:3}".parse::<TimestepKeyFormat>().is_err());
        assert!("{0:0d}".parse::<TimestepKeyFormat>().is_err());
        let five: TimestepKeyFormat = "{0:05d}".parse().unwrap();
        assert_eq!(five.render(4), "00004");
    }

    #[test]
    fn test_parse_key() {
        let format = TimestepKeyFormat::default();
        assert_eq!(format.parse_key("007"), Some(7));
        assert_eq!(format.parse_key("12"), Some(12));
        assert_eq!(format.parse_key("7a"), None);
        assert_eq!(format.parse_key(""), None);
    }
}
