//! Human-readable byte sizes (e.g. "256MB", "2GB").

use std::fmt;

use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Longest suffixes first so "MB" is not read as "B".
const SUFFIXES: [(&str, u64); 9] = [
    ("TB", TB),
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("T", TB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '2GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

/// Parse a size string into bytes.
///
/// Accepts a bare integer (bytes) or an integer followed by a binary unit
/// (`B`, `K`/`KB`, `M`/`MB`, `G`/`GB`, `T`/`TB`), case-insensitive, with
/// optional whitespace between number and unit.
///
/// # Examples
///
/// ```
/// use imgcache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("256mb").unwrap(), 256 * 1024 * 1024);
/// assert!(parse_size("1.5GB").is_err());
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let error = || SizeParseError {
        input: s.to_string(),
    };

    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|number| (number.trim_end(), *multiplier))
        })
        .unwrap_or((upper.as_str(), 1));

    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(error());
    }

    number
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(error)
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// # Examples
///
/// ```
/// use imgcache::config::format_size;
///
/// assert_eq!(format_size(1024), "1KB");
/// assert_eq!(format_size(256 * 1024 * 1024), "256MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: u64) -> String {
    for (suffix, unit) in [("TB", TB), ("GB", GB), ("MB", MB), ("KB", KB)] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

/// Approximate a byte count for display, e.g. `1.5 MB`.
///
/// Uses the same binary units as [`parse_size`]. Not reversible; use
/// [`format_size`] for values written back to a config file.
///
/// ```
/// use imgcache::config::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let value = bytes as f64;
    if bytes >= TB {
        format!("{:.2} TB", value / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", value / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", value / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", value / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// A size value that round-trips through its human-readable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub u64);

impl Size {
    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn from_mb(mb: u64) -> Self {
        Self(mb * MB)
    }

    pub fn from_gb(gb: u64) -> Self {
        Self(gb * GB)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_size(self.0))
    }
}

impl std::str::FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_number() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("999999").unwrap(), 999_999);
        assert_eq!(parse_size("12B").unwrap(), 12);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("1kb").unwrap(), 1024);
        assert_eq!(parse_size("500MB").unwrap(), 500 * MB);
        assert_eq!(parse_size("2g").unwrap(), 2 * GB);
        assert_eq!(parse_size("1TB").unwrap(), TB);
    }

    #[test]
    fn test_parse_whitespace() {
        assert_eq!(parse_size("  2GB  ").unwrap(), 2 * GB);
        assert_eq!(parse_size("500 MB").unwrap(), 500 * MB);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("-1GB").is_err());
        assert!(parse_size("+1GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("2PB").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        assert!(parse_size("99999999999TB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(1024 * 1024), "1MB");
        assert_eq!(format_size(2 * GB), "2GB");
        assert_eq!(format_size(1536), "1536");
        assert_eq!(format_size(1536 * KB), "1536KB");
    }

    #[test]
    fn test_size_display_and_parse_agree() {
        for text in ["256MB", "2GB", "4KB", "100"] {
            let size: Size = text.parse().unwrap();
            assert_eq!(size.to_string(), text);
        }
        assert_eq!(Size::from_mb(3).bytes(), 3 * MB);
        assert_eq!(Size::from_gb(1), Size(GB));
    }
}
