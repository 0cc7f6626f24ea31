//! Unified error types for the rollcall core library.
//!
//! This module provides a unified error type [`Error`] that covers all
//! failure modes across the attendance system. Module-local error types
//! ([`RadioError`](crate::bluetooth::RadioError),
//! [`StoreError`](crate::storage::StoreError)) convert into it via `From`.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide users toward resolution
//! - **Rejections are not faults**: being too far from a beacon or cancelling
//!   a prompt is an expected operational state, distinguished through
//!   [`Error::is_user_rejection`]

use std::path::PathBuf;
use thiserror::Error;

use crate::bluetooth::{Permission, RadioError, RadioState};
use crate::storage::StoreError;

/// The unified error type for all rollcall operations.
#[derive(Debug, Error)]
pub enum Error {
    // =========================================================================
    // SCAN STARTUP ERRORS
    // =========================================================================
    /// A required platform permission was not granted.
    #[error("Permission denied: {permission}. Grant Bluetooth and location access to scan for beacons.")]
    PermissionDenied {
        /// The permission that was refused.
        permission: Permission,
    },

    /// The Bluetooth radio is present but not ready for scanning.
    #[error("Bluetooth radio is not ready (state: {state}). Turn on Bluetooth to scan for beacons.")]
    RadioUnavailable {
        /// The state the radio driver reported.
        state: RadioState,
    },

    /// The radio driver rejected the scan request.
    #[error("Could not start the beacon scan: {0}")]
    ScanStartFailed(String),

    // =========================================================================
    // ATTENDANCE REJECTIONS
    // =========================================================================
    /// The beacon signal is below the proximity threshold.
    #[error("Too far from the beacon ({rssi} dBm, needs at least {threshold} dBm). Move closer to check in or out.")]
    TooFarToAct {
        /// Observed signal strength.
        rssi: i16,
        /// Configured admission threshold.
        threshold: i16,
    },

    /// The user declined the confirmation prompt.
    #[error("Action cancelled at the confirmation prompt")]
    ConfirmationDeclined,

    /// The user backed out of the selfie capture.
    #[error("Selfie capture was cancelled")]
    CaptureCancelled,

    /// The camera reported an error during capture.
    #[error("Selfie capture failed: {0}")]
    CaptureFailed(String),

    // =========================================================================
    // VALIDATION ERRORS
    // =========================================================================
    /// A profile field failed validation.
    #[error("Invalid profile {field}: {message}")]
    InvalidProfile {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidation {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    // =========================================================================
    // CONFIGURATION I/O ERRORS
    // =========================================================================
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration at {}: {source}", .path.display())]
    ConfigRead {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The configuration file could not be written.
    #[error("Failed to write configuration at {}: {source}", .path.display())]
    ConfigWrite {
        /// The configuration file path.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration could not be serialized for saving.
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // =========================================================================
    // PERSISTENCE ERRORS
    // =========================================================================
    /// The durable store failed to produce a value.
    #[error("Attendance store read failed for '{key}': {source}")]
    StoreReadFailed {
        /// The store key being read.
        key: String,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The durable store failed to persist a value.
    #[error("Attendance store write failed for '{key}': {source}")]
    StoreWriteFailed {
        /// The store key being written.
        key: String,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// A value could not be serialized for persistence.
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A specialized [`Result`] type for rollcall operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns `true` if this error is an expected user-facing rejection
    /// rather than a system fault.
    ///
    /// Rejections block the attempted action (and never create an
    /// attendance event) but require no recovery beyond informing the
    /// user: being too far from the beacon, declining the confirmation
    /// prompt, or cancelling the selfie.
    #[inline]
    #[must_use]
    pub const fn is_user_rejection(&self) -> bool {
        matches!(
            self,
            Self::TooFarToAct { .. } | Self::ConfirmationDeclined | Self::CaptureCancelled
        )
    }

    /// Returns `true` if this error aborted the scan startup chain.
    ///
    /// These are terminal for the attempt; the controller has returned to
    /// idle and a new user-initiated attempt is required.
    #[inline]
    #[must_use]
    pub const fn is_scan_startup_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::RadioUnavailable { .. } | Self::ScanStartFailed(_)
        )
    }

    /// Returns `true` if this error originated in the durable store.
    #[inline]
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::StoreReadFailed { .. } | Self::StoreWriteFailed { .. } | Self::Serialize(_)
        )
    }

    /// Returns `true` if this error is a validation failure of user or
    /// configuration input.
    #[inline]
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProfile { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::RadioUnavailable { .. } => "RADIO_UNAVAILABLE",
            Self::ScanStartFailed(_) => "SCAN_START_FAILED",
            Self::TooFarToAct { .. } => "TOO_FAR_TO_ACT",
            Self::ConfirmationDeclined => "CONFIRMATION_DECLINED",
            Self::CaptureCancelled => "CAPTURE_CANCELLED",
            Self::CaptureFailed(_) => "CAPTURE_FAILED",
            Self::InvalidProfile { .. } => "INVALID_PROFILE",
            Self::ConfigValidation { .. } => "CONFIG_VALIDATION",
            Self::ConfigRead { .. } => "CONFIG_READ",
            Self::ConfigWrite { .. } => "CONFIG_WRITE",
            Self::ConfigParse(_) => "CONFIG_PARSE",
            Self::ConfigSerialize(_) => "CONFIG_SERIALIZE",
            Self::StoreReadFailed { .. } => "STORE_READ_FAILED",
            Self::StoreWriteFailed { .. } => "STORE_WRITE_FAILED",
            Self::Serialize(_) => "SERIALIZE",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Read { key, source } => Self::StoreReadFailed { key, source },
            StoreError::Write { key, source } => Self::StoreWriteFailed { key, source },
        }
    }
}

impl From<RadioError> for Error {
    fn from(err: RadioError) -> Self {
        Self::ScanStartFailed(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_user_rejection_classification() {
        assert!(Error::TooFarToAct {
            rssi: -70,
            threshold: -55
        }
        .is_user_rejection());
        assert!(Error::ConfirmationDeclined.is_user_rejection());
        assert!(Error::CaptureCancelled.is_user_rejection());

        assert!(!Error::CaptureFailed("lens stuck".into()).is_user_rejection());
        assert!(!Error::ScanStartFailed("busy".into()).is_user_rejection());
    }

    #[test]
    fn test_scan_startup_classification() {
        assert!(Error::PermissionDenied {
            permission: Permission::BluetoothScan
        }
        .is_scan_startup_error());
        assert!(Error::RadioUnavailable {
            state: RadioState::Off
        }
        .is_scan_startup_error());
        assert!(Error::ScanStartFailed("busy".into()).is_scan_startup_error());

        assert!(!Error::ConfirmationDeclined.is_scan_startup_error());
    }

    #[test]
    fn test_store_error_classification() {
        let read = Error::StoreReadFailed {
            key: "attendance_log".into(),
            source: IoErr::new(ErrorKind::NotFound, "gone"),
        };
        assert!(read.is_store_error());
        assert!(!read.is_user_rejection());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::TooFarToAct {
                rssi: -70,
                threshold: -55
            }
            .error_code(),
            "TOO_FAR_TO_ACT"
        );
        assert_eq!(
            Error::RadioUnavailable {
                state: RadioState::Off
            }
            .error_code(),
            "RADIO_UNAVAILABLE"
        );
        assert_eq!(Error::CaptureCancelled.error_code(), "CAPTURE_CANCELLED");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: Error = StoreError::Write {
            key: "attendance_log".into(),
            source: IoErr::new(ErrorKind::PermissionDenied, "read-only"),
        }
        .into();
        assert!(matches!(err, Error::StoreWriteFailed { .. }));
        assert_eq!(err.error_code(), "STORE_WRITE_FAILED");
    }

    #[test]
    fn test_radio_error_conversion() {
        let err: Error = RadioError::ScanRequestFailed("adapter busy".into()).into();
        assert!(matches!(err, Error::ScanStartFailed(_)));
        assert!(format!("{err}").contains("adapter busy"));
    }

    #[test]
    fn test_display_messages_are_actionable() {
        let err = Error::TooFarToAct {
            rssi: -70,
            threshold: -55,
        };
        assert!(format!("{err}").contains("Move closer"));

        let err = Error::RadioUnavailable {
            state: RadioState::Off,
        };
        assert!(format!("{err}").contains("Turn on Bluetooth"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
