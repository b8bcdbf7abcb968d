/// Utility functions for formatting captured data
use time::{format_description, OffsetDateTime};

/// Format a timestamp for reports and logging
///
/// Converts an OffsetDateTime to YYYY-MM-DD HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Uppercase two-digit hex for each byte, joined by single spaces
pub fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_timestamp() {
        let dt = datetime!(2024-03-07 09:05:01 UTC);
        assert_eq!(format_datetime(&dt), "2024-03-07 09:05:01");
    }

    #[test]
    fn hex_dump() {
        assert_eq!(hex_bytes(&[0x02, 0x01, 0x06, 0xff]), "02 01 06 FF");
        assert_eq!(hex_bytes(&[]), "");
    }
}
