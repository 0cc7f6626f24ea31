//! # rollcall-core
//!
//! Core business logic for the rollcall proximity attendance recorder.
//!
//! rollcall detects a nearby Bluetooth Low Energy beacon, verifies the
//! user is close enough via signal strength, captures a selfie as proof,
//! and records a check-in/check-out event in a persisted log.
//!
//! This crate provides:
//! - Beacon discovery tracking and RSSI-based active-beacon selection
//! - The scan lifecycle state machine with a periodic reconciliation poll
//! - The proximity-gated check-in/check-out attendance state machine
//! - Persistent storage for the attendance log and user profile
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`beacon`] - Beacon registry, signal-strength selection, proximity gate
//! - [`bluetooth`] - Scan lifecycle control and radio collaborator contracts
//! - [`attendance`] - Check-in/check-out state machine and the event log
//! - [`profile`] - User registration data and validation
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`storage`] - Durable key-value persistence
//! - [`error`] - Unified error types for the crate
//!
//! Platform facilities (the radio driver, the OS permission layer, the
//! camera, the confirmation dialog) are modeled as collaborator traits
//! and injected by the embedding layer; every state machine here is an
//! explicitly constructed, owned value.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

pub mod attendance;
pub mod beacon;
pub mod bluetooth;
pub mod config;
pub mod error;
pub mod profile;
pub mod storage;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export primary types for convenience
pub use attendance::{
    AttendanceEvent, AttendanceManager, Camera, CaptureOutcome, CaptureRequest, Confirmation,
    ConfirmationPrompt, EventKind, EventLog, ToggleState,
};
pub use beacon::{is_near, select_active, Advertisement, Beacon, BeaconRegistry};
pub use bluetooth::{
    Permission, PermissionDecision, PermissionGate, RadioDriver, RadioError, RadioEvent,
    RadioState, ScanController, ScanPhase, ScanRequest, StartOptions,
};
pub use config::{
    is_valid_beacon_id, AttendanceConfig, Config, LocationDirectory, ScanConfig,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RSSI_THRESHOLD,
};
pub use error::{Error, Result};
pub use profile::UserProfile;
pub use storage::{
    FileStore, KeyValueStore, MemoryStore, StoreError, EVENT_LOG_KEY, USER_PROFILE_KEY,
};
