use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DURATION_SECS: u64 = 180;
const DEFAULT_ADAPTER: &str = "hci0";
const DEFAULT_REPORT_FILE: &str = "ble_capture.txt";

/// How UUIDs that cannot be reduced to 16 bits are surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UuidParsePolicy {
    /// Drop quietly, only visible at debug level
    Ignore,
    /// Drop and log a warning
    Warn,
}

impl FromStr for UuidParsePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(UuidParsePolicy::Ignore),
            "warn" => Ok(UuidParsePolicy::Warn),
            other => Err(format!(
                "unknown UUID parse policy '{}', expected 'ignore' or 'warn'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub duration: Duration,
    pub adapter: String,
    pub target_names: Vec<String>,
    pub target_addresses: Vec<String>,
    pub report_file: String,
    pub uuid_policy: UuidParsePolicy,
    pub interactive_replay: bool,
}

impl CaptureConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from a key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let duration_secs = match lookup("BLE_CAPTURE_DURATION_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("Invalid BLE_CAPTURE_DURATION_SECS '{}': {}", value, e))?,
            None => DEFAULT_DURATION_SECS,
        };

        let adapter = lookup("BLE_ADAPTER")
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_ADAPTER.to_string());

        let target_names = lookup("BLE_TARGET_NAMES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        // Addresses are compared in the uppercase form the scanner reports
        let target_addresses = lookup("BLE_TARGET_ADDRESSES")
            .map(|v| split_list(&v).into_iter().map(|a| a.to_uppercase()).collect())
            .unwrap_or_default();

        let report_file = lookup("BLE_REPORT_FILE")
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_REPORT_FILE.to_string());

        let uuid_policy = match lookup("BLE_UUID_PARSE_POLICY") {
            Some(value) => value.parse::<UuidParsePolicy>()?,
            None => UuidParsePolicy::Ignore,
        };

        let interactive_replay = match lookup("BLE_INTERACTIVE_REPLAY") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| format!("Invalid BLE_INTERACTIVE_REPLAY '{}'", value))?,
            None => true,
        };

        Ok(CaptureConfig {
            duration: Duration::from_secs(duration_secs),
            adapter,
            target_names,
            target_addresses,
            report_file,
            uuid_policy,
            interactive_replay,
        })
    }

    /// Whether a device passes the configured name/address filters
    pub fn accepts(&self, address: &str, name: Option<&str>) -> bool {
        if !self.target_names.is_empty()
            && !name.is_some_and(|n| self.target_names.iter().any(|t| t == n))
        {
            return false;
        }
        if !self.target_addresses.is_empty()
            && !self
                .target_addresses
                .iter()
                .any(|t| t.eq_ignore_ascii_case(address))
        {
            return false;
        }
        true
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<CaptureConfig, Box<dyn std::error::Error>> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CaptureConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.duration, Duration::from_secs(180));
        assert_eq!(config.adapter, "hci0");
        assert_eq!(config.report_file, "ble_capture.txt");
        assert_eq!(config.uuid_policy, UuidParsePolicy::Ignore);
        assert!(config.interactive_replay);
        assert!(config.accepts("AA:BB:CC:DD:EE:FF", None));
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("BLE_CAPTURE_DURATION_SECS", "15"),
            ("BLE_ADAPTER", "hci1"),
            ("BLE_TARGET_NAMES", "iPhone, AirPods ,,Mi Band"),
            ("BLE_TARGET_ADDRESSES", "aa:bb:cc:dd:ee:ff"),
            ("BLE_UUID_PARSE_POLICY", "WARN"),
            ("BLE_INTERACTIVE_REPLAY", "no"),
        ])
        .unwrap();

        assert_eq!(config.duration, Duration::from_secs(15));
        assert_eq!(config.adapter, "hci1");
        assert_eq!(config.target_names, vec!["iPhone", "AirPods", "Mi Band"]);
        assert_eq!(config.target_addresses, vec!["AA:BB:CC:DD:EE:FF"]);
        assert_eq!(config.uuid_policy, UuidParsePolicy::Warn);
        assert!(!config.interactive_replay);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config_from(&[("BLE_CAPTURE_DURATION_SECS", "soon")]).is_err());
        assert!(config_from(&[("BLE_UUID_PARSE_POLICY", "panic")]).is_err());
        assert!(config_from(&[("BLE_INTERACTIVE_REPLAY", "maybe")]).is_err());
    }

    #[test]
    fn filters_by_name_and_address() {
        let config = config_from(&[
            ("BLE_TARGET_NAMES", "Mi Band"),
            ("BLE_TARGET_ADDRESSES", "AA:BB:CC:DD:EE:FF"),
        ])
        .unwrap();

        assert!(config.accepts("aa:bb:cc:dd:ee:ff", Some("Mi Band")));
        assert!(!config.accepts("AA:BB:CC:DD:EE:FF", Some("iPhone")));
        assert!(!config.accepts("AA:BB:CC:DD:EE:FF", None));
        assert!(!config.accepts("11:22:33:44:55:66", Some("Mi Band")));
    }
}
