//! Scan lifecycle control and radio collaborator contracts.
//!
//! This module provides:
//! - The [`RadioDriver`] and [`PermissionGate`] collaborator traits
//! - The [`ScanController`] lifecycle state machine
//!   (idle → requesting permissions → enabling radio → scanning → stopped)
//! - The periodic reconciliation poll that complements event-driven
//!   discovery when the radio stack throttles or drops events
//!
//! The controller is the single writer of the [`BeaconRegistry`]: both
//! discovery events and reconciliation snapshots are normalized at the
//! boundary and fed through the same update path, so the two sources
//! converge on the same registry state.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::beacon::{select_active, Advertisement, Beacon, BeaconRegistry};
use crate::config::ScanConfig;
use crate::error::{Error as CoreError, Result};

/// First Android API level with the dedicated Bluetooth runtime permissions.
const BLUETOOTH_PERMISSION_API_LEVEL: u32 = 31;

/// Platform permission kinds recognized by the permission layer.
///
/// Which kinds a scan needs depends on the OS version; see
/// [`required_permissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Approximate location access.
    CoarseLocation,
    /// Precise location access. BLE scanning implies location on older
    /// Android versions.
    FineLocation,
    /// Dedicated BLE scan permission (API 31+).
    BluetoothScan,
    /// Dedicated BLE connect permission (API 31+).
    BluetoothConnect,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CoarseLocation => "coarse location",
            Self::FineLocation => "fine location",
            Self::BluetoothScan => "Bluetooth scan",
            Self::BluetoothConnect => "Bluetooth connect",
        };
        f.write_str(name)
    }
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    /// The user granted the permission.
    Granted,
    /// The user (or platform policy) refused the permission.
    Denied,
}

/// The OS permission layer.
pub trait PermissionGate {
    /// The platform API level, which decides the required permission set.
    fn api_level(&self) -> u32;

    /// Ask the user for one permission.
    async fn request(&mut self, permission: Permission) -> PermissionDecision;
}

/// The permissions a scan needs at the given API level. All are required.
#[must_use]
pub fn required_permissions(api_level: u32) -> Vec<Permission> {
    if api_level < BLUETOOTH_PERMISSION_API_LEVEL {
        vec![Permission::FineLocation]
    } else {
        vec![
            Permission::BluetoothScan,
            Permission::BluetoothConnect,
            Permission::FineLocation,
        ]
    }
}

/// Radio adapter power state as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Powered and ready to scan.
    On,
    /// Powered off.
    Off,
    /// Transitioning on.
    TurningOn,
    /// Transitioning off.
    TurningOff,
    /// The driver could not determine the state.
    Unknown,
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::On => "on",
            Self::Off => "off",
            Self::TurningOn => "turning on",
            Self::TurningOff => "turning off",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Scan latency/duty-cycle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Battery-friendly, slow discovery.
    LowPower,
    /// Middle ground.
    Balanced,
    /// Fastest discovery; used while actively recording attendance.
    LowLatency,
}

/// Advertisement match aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Report on weak and infrequent sightings.
    Aggressive,
    /// Require stronger, repeated sightings.
    Sticky,
}

/// Parameters of a scan request.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Service UUIDs to scan for; empty scans for everything.
    pub service_filter: Vec<String>,

    /// How long to scan. [`Duration::ZERO`] scans until stopped.
    pub duration: Duration,

    /// Whether repeated advertisements from the same device are
    /// redelivered. Required for live RSSI tracking.
    pub allow_duplicates: bool,

    /// Latency tuning.
    pub scan_mode: ScanMode,

    /// Match aggressiveness.
    pub match_mode: MatchMode,
}

impl Default for ScanRequest {
    /// The attendance scan shape: unbounded, duplicate-allowing,
    /// low-latency, aggressive matching.
    fn default() -> Self {
        Self {
            service_filter: Vec::new(),
            duration: Duration::ZERO,
            allow_duplicates: true,
            scan_mode: ScanMode::LowLatency,
            match_mode: MatchMode::Aggressive,
        }
    }
}

/// Options for bringing up the radio driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Whether the platform may show its own power dialog on start.
    pub show_power_alert: bool,
}

/// Events emitted by the radio driver while scanning.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// A device advertisement was received.
    Discovered(Advertisement),
    /// The platform stopped the scan (timeout, radio loss, user toggle).
    ScanStopped,
}

/// Failure modes of a [`RadioDriver`].
#[derive(Debug, Error)]
pub enum RadioError {
    /// The driver itself failed to initialize.
    #[error("radio driver failed to start: {0}")]
    StartFailed(String),

    /// The radio-enable request failed.
    #[error("radio enable request failed: {0}")]
    EnableFailed(String),

    /// The scan request was rejected.
    #[error("scan request rejected: {0}")]
    ScanRequestFailed(String),

    /// The discovered-device snapshot could not be produced.
    #[error("discovered-device snapshot unavailable: {0}")]
    SnapshotFailed(String),
}

/// The BLE radio driver collaborator.
///
/// Discovery events are delivered out-of-band through an
/// [`mpsc`] channel of [`RadioEvent`]s owned by the embedding layer;
/// this trait covers the request/response half of the contract.
pub trait RadioDriver {
    /// Initialize the driver. Must be called once before scanning.
    async fn start(&mut self, options: &StartOptions) -> std::result::Result<(), RadioError>;

    /// Ask the platform to power the radio on.
    async fn enable_radio(&mut self) -> std::result::Result<(), RadioError>;

    /// The current adapter power state.
    async fn radio_state(&mut self) -> RadioState;

    /// Begin scanning with the given parameters.
    async fn scan(&mut self, request: &ScanRequest) -> std::result::Result<(), RadioError>;

    /// Everything the platform has discovered so far in this scan session.
    async fn discovered_snapshot(&mut self)
        -> std::result::Result<Vec<Advertisement>, RadioError>;
}

/// Lifecycle state of the scan controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Not scanning; ready to start.
    Idle,
    /// Waiting on the OS permission layer.
    RequestingPermissions,
    /// Waiting on the radio to power up.
    EnablingRadio,
    /// Actively scanning; registry is live.
    Scanning,
    /// Scanning ended; registry retains the last session's sightings.
    Stopped,
}

/// Owns the scanning lifecycle and the beacon registry.
///
/// The controller is constructed with its collaborators and owned by the
/// embedding layer. Dropping it releases the reconciliation timer and
/// the driver subscription held by [`run`](Self::run), whichever state
/// it is in.
pub struct ScanController<R, P> {
    radio: R,
    permissions: P,
    config: ScanConfig,
    registry: BeaconRegistry,
    phase: ScanPhase,
}

impl<R: RadioDriver, P: PermissionGate> ScanController<R, P> {
    /// Create a controller in the idle state.
    pub fn new(radio: R, permissions: P, config: ScanConfig) -> Self {
        Self {
            radio,
            permissions,
            config,
            registry: BeaconRegistry::new(),
            phase: ScanPhase::Idle,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Read-only view of the beacon registry.
    #[must_use]
    pub const fn registry(&self) -> &BeaconRegistry {
        &self.registry
    }

    /// The strongest-signal beacon currently visible, if any.
    #[must_use]
    pub fn active_beacon(&self) -> Option<Beacon> {
        let snapshot = self.registry.snapshot();
        select_active(&snapshot).cloned()
    }

    /// Initialize the radio driver. Call once at startup.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ScanStartFailed`] when the driver cannot start.
    pub async fn initialize(&mut self) -> Result<()> {
        self.radio.start(&StartOptions::default()).await?;
        debug!("radio driver ready");
        Ok(())
    }

    /// Walk the startup chain and begin scanning.
    ///
    /// Already scanning is a no-op. Any failure in the chain (permission
    /// denied, radio not on, scan request rejected) aborts back to idle
    /// and is returned to the caller; recovery is a new user-initiated
    /// attempt.
    ///
    /// # Errors
    ///
    /// See [`CoreError::is_scan_startup_error`].
    pub async fn start_scan(&mut self) -> Result<()> {
        if self.phase == ScanPhase::Scanning {
            return Ok(());
        }
        match self.try_start().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.phase = ScanPhase::Idle;
                Err(err)
            }
        }
    }

    async fn try_start(&mut self) -> Result<()> {
        self.phase = ScanPhase::RequestingPermissions;
        let api_level = self.permissions.api_level();
        debug!(api_level, "requesting scan permissions");
        for permission in required_permissions(api_level) {
            if self.permissions.request(permission).await == PermissionDecision::Denied {
                info!(%permission, "scan permission denied");
                return Err(CoreError::PermissionDenied { permission });
            }
        }

        self.phase = ScanPhase::EnablingRadio;
        if let Err(err) = self.radio.enable_radio().await {
            warn!(error = %err, "radio enable request failed, checking state anyway");
        }
        let state = self.radio.radio_state().await;
        if state != RadioState::On {
            info!(%state, "radio is not ready for scanning");
            return Err(CoreError::RadioUnavailable { state });
        }

        let request = ScanRequest {
            service_filter: self.config.service_filter.clone(),
            ..ScanRequest::default()
        };
        self.radio.scan(&request).await?;

        // A fresh session must not show stale beacons from the last one.
        self.registry.reset();
        self.phase = ScanPhase::Scanning;
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "scan active"
        );
        Ok(())
    }

    /// Stop scanning. The registry keeps the last session's sightings
    /// until the next scan start.
    pub fn stop(&mut self) {
        if self.phase == ScanPhase::Scanning {
            info!("scan stopped");
        }
        self.phase = ScanPhase::Stopped;
    }

    /// React to one radio event.
    pub fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Discovered(advertisement) => {
                debug!(id = %advertisement.id, "discovery event");
                self.observe(advertisement);
            }
            RadioEvent::ScanStopped => {
                debug!("driver signaled scan stop");
                self.stop();
            }
        }
    }

    /// Pull the driver's full discovery snapshot and merge it into the
    /// registry. Compensates for discovery events the radio stack missed
    /// or throttled; a failed poll is skipped, the next one self-corrects.
    pub async fn reconcile(&mut self) {
        if self.phase != ScanPhase::Scanning {
            return;
        }
        match self.radio.discovered_snapshot().await {
            Ok(snapshot) => {
                debug!(count = snapshot.len(), "reconciliation poll");
                for advertisement in snapshot {
                    self.observe(advertisement);
                }
            }
            Err(err) => warn!(error = %err, "reconciliation poll failed"),
        }
    }

    /// Drive the controller until the scan stops or the event stream
    /// closes.
    ///
    /// Owns the reconciliation timer for the duration of the call;
    /// returning cancels it. Events and timer ticks are processed one at
    /// a time, so no two registry mutations are ever concurrent.
    pub async fn run(&mut self, events: &mut mpsc::UnboundedReceiver<RadioEvent>) {
        let mut poll = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms));
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while self.phase == ScanPhase::Scanning {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("radio event stream closed");
                        self.stop();
                    }
                },
                _ = poll.tick() => self.reconcile().await,
            }
        }
    }

    /// Normalize and admit one advertisement. The single entry point for
    /// both discovery paths.
    fn observe(&mut self, advertisement: Advertisement) {
        let Some(beacon) = advertisement.normalize() else {
            debug!("dropped advertisement without an RSSI sample");
            return;
        };
        if !self.config.accepts(&beacon.display_name) {
            return;
        }
        self.registry.upsert(beacon);
    }
}
