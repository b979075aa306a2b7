//! Utility functions and helpers for affiliate-export
//!
//! This module provides common utility functions used throughout the application:
//! - String sanitization for file names
//! - Time and duration formatting
//! - File system helpers
//! - Size formatting

use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// String utilities
pub mod string {
    /// Sanitize a user-supplied string for use in a file name.
    ///
    /// Keeps ASCII alphanumerics, `-` and `_`; every other character is
    /// replaced with `_`. The result is never empty: a fully-replaced input
    /// still yields a run of underscores.
    ///
    /// # Arguments
    /// * `s` - Raw component (e.g. a root affiliate key)
    ///
    /// # Returns
    /// * `String` - File-name-safe component
    pub fn sanitize_component(s: &str) -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

/// Time and duration utilities
pub mod time {
    use super::*;

    /// Format duration as human-readable string
    ///
    /// # Arguments
    /// * `duration` - Duration to format
    ///
    /// # Returns
    /// * `String` - Formatted duration (e.g., "1h 30m 45s")
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();

        if secs == 0 {
            return format!("{}ms", millis);
        }

        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        let mut parts = Vec::new();

        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 || parts.is_empty() {
            parts.push(format!("{}s", seconds));
        }

        parts.join(" ")
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    /// Ensure directory exists, create if not
    ///
    /// # Arguments
    /// * `path` - Directory path
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn ensure_dir_exists<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

/// Conversion utilities
pub mod convert {
    /// Format bytes as human-readable size
    ///
    /// # Arguments
    /// * `bytes` - Number of bytes
    ///
    /// # Returns
    /// * `String` - Formatted size (e.g., "1.5 MB")
    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Convert a byte count to megabytes rounded to two decimals.
    pub fn bytes_to_mb(bytes: u64) -> f64 {
        let mb = bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(string::sanitize_component("acme01"), "acme01");
        assert_eq!(string::sanitize_component("top agent"), "top_agent");
        assert_eq!(string::sanitize_component("a/b\\c:d"), "a_b_c_d");
        assert_eq!(string::sanitize_component("ñandú"), "_and_");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(time::format_duration(Duration::from_secs(0)), "0ms");
        assert_eq!(time::format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(time::format_duration(Duration::from_secs(3661)), "1h 1m 1s");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(convert::format_bytes(500), "500 B");
        assert_eq!(convert::format_bytes(1024), "1.00 KB");
        assert_eq!(convert::format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_bytes_to_mb() {
        assert_eq!(convert::bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(convert::bytes_to_mb(1_572_864), 1.5);
        assert_eq!(convert::bytes_to_mb(0), 0.0);
    }
}
