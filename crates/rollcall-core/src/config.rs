//! Application configuration management.
//!
//! Handles loading, saving, and validating rollcall configuration:
//! - Proximity threshold calibration
//! - Scan tuning (reconciliation poll interval, advertiser name filter)
//! - The beacon-to-location directory
//! - Display timezone for event timestamps

use std::collections::BTreeMap;
use std::path::Path;

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// RSSI at or above which a beacon is close enough to act on.
/// Calibrated to roughly arm's length for typical BLE beacon hardware.
pub const DEFAULT_RSSI_THRESHOLD: i16 = -55;

/// Interval between reconciliation polls of the radio driver.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

static BEACON_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("beacon id regex is valid")
});

/// Whether `id` is a well-formed beacon hardware identifier
/// (colon-separated MAC address form).
#[must_use]
pub fn is_valid_beacon_id(id: &str) -> bool {
    BEACON_ID_REGEX.is_match(id)
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan tuning.
    pub scan: ScanConfig,

    /// Attendance recording settings.
    pub attendance: AttendanceConfig,

    /// Beacon-to-location directory.
    pub locations: LocationDirectory,
}

/// Scan tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Milliseconds between reconciliation polls while scanning.
    pub poll_interval_ms: u64,

    /// Case-insensitive substring filter on the advertised name.
    /// Unset (or empty) accepts every advertiser.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,

    /// Service UUIDs passed to the scan request; empty scans for everything.
    pub service_filter: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            name_filter: None,
            service_filter: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Whether an advertiser with this display name passes the filter.
    #[must_use]
    pub fn accepts(&self, display_name: &str) -> bool {
        match self.name_filter.as_deref() {
            None | Some("") => true,
            Some(filter) => display_name
                .to_uppercase()
                .contains(&filter.to_uppercase()),
        }
    }
}

/// Attendance recording settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// RSSI threshold for considering a beacon "close enough" to act on.
    pub rssi_threshold: i16,

    /// Timezone used to render human-readable event timestamps.
    #[serde(with = "timezone_serde")]
    pub timezone: Tz,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            rssi_threshold: DEFAULT_RSSI_THRESHOLD,
            timezone: chrono_tz::UTC,
        }
    }
}

/// Static mapping from beacon hardware id to a human-readable location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationDirectory {
    /// Beacon hardware id -> room name.
    pub entries: BTreeMap<String, String>,

    /// Fallback room name for beacons not present in `entries`.
    pub default_location: String,
}

impl Default for LocationDirectory {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            default_location: "Unassigned Room".to_string(),
        }
    }
}

impl LocationDirectory {
    /// Resolve a beacon id to its location name, falling back to the
    /// default location for unmapped beacons.
    #[must_use]
    pub fn resolve(&self, beacon_id: &str) -> &str {
        self.entries
            .get(beacon_id)
            .map_or(self.default_location.as_str(), String::as_str)
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::ConfigWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the configuration for values that cannot work at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn validate(&self) -> Result<()> {
        if self.scan.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                field: "scan.poll_interval_ms",
                message: "poll interval must be at least 1ms".to_string(),
            });
        }
        if !(-100..=0).contains(&self.attendance.rssi_threshold) {
            return Err(Error::ConfigValidation {
                field: "attendance.rssi_threshold",
                message: format!(
                    "{} dBm is outside the plausible -100..=0 range",
                    self.attendance.rssi_threshold
                ),
            });
        }
        if self.locations.default_location.trim().is_empty() {
            return Err(Error::ConfigValidation {
                field: "locations.default_location",
                message: "a default location is required".to_string(),
            });
        }
        for beacon_id in self.locations.entries.keys() {
            if !is_valid_beacon_id(beacon_id) {
                return Err(Error::ConfigValidation {
                    field: "locations.entries",
                    message: format!("'{beacon_id}' is not a valid beacon hardware id"),
                });
            }
        }
        Ok(())
    }
}

mod timezone_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
