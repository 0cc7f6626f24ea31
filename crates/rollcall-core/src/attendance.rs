//! Attendance recording: the check-in/check-out state machine and its log.
//!
//! The current toggle state is never stored; it is always derived from
//! the newest event in the persisted log, so the flag and the history
//! cannot diverge. Recording an event requires passing the proximity
//! gate, an explicit user confirmation, and then a successful selfie
//! capture. No event is ever created without the capture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::beacon::{is_near, Beacon};
use crate::config::{AttendanceConfig, LocationDirectory};
use crate::error::{Error, Result};
use crate::profile::{UserProfile, UNREGISTERED_MATRIX, UNREGISTERED_NAME};
use crate::storage::{KeyValueStore, EVENT_LOG_KEY};

/// Timestamp rendering for the human-readable event field.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Direction of an attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Arrival.
    CheckIn,
    /// Departure.
    CheckOut,
}

/// Current attendance status, derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    /// The newest event is a check-in.
    CheckedIn,
    /// The newest event is a check-out, or the log is empty.
    CheckedOut,
}

impl ToggleState {
    /// The action that would flip this state.
    #[must_use]
    pub const fn next_action(self) -> EventKind {
        match self {
            Self::CheckedIn => EventKind::CheckOut,
            Self::CheckedOut => EventKind::CheckIn,
        }
    }
}

/// A single recorded check-in or check-out. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Unique identifier, monotonic by creation time.
    pub id: String,

    /// Name of the user at recording time.
    pub user_name: String,

    /// Matrix number of the user at recording time.
    pub matrix_number: String,

    /// Opaque handle to the captured proof photo.
    pub photo_ref: String,

    /// When the event was recorded (UTC).
    pub recorded_at_utc: DateTime<Utc>,

    /// Human-readable recording time in the configured timezone.
    pub timestamp: String,

    /// Whether this is a check-in or a check-out.
    pub kind: EventKind,

    /// The beacon the user acted against.
    pub beacon_id: String,

    /// Location resolved from the beacon id.
    pub location: String,
}

/// Append-only attendance history, newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<AttendanceEvent>,
}

impl EventLog {
    /// The toggle state this log implies: checked in exactly when the
    /// newest event is a check-in, checked out otherwise (including an
    /// empty log).
    #[must_use]
    pub fn toggle(&self) -> ToggleState {
        match self.events.first() {
            Some(event) if event.kind == EventKind::CheckIn => ToggleState::CheckedIn,
            _ => ToggleState::CheckedOut,
        }
    }

    /// The events, newest first.
    #[must_use]
    pub fn events(&self) -> &[AttendanceEvent] {
        &self.events
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A copy of this log with `event` prepended as the newest entry.
    fn prepended(&self, event: AttendanceEvent) -> Self {
        let mut events = Vec::with_capacity(self.events.len() + 1);
        events.push(event);
        events.extend(self.events.iter().cloned());
        Self { events }
    }
}

/// Which camera captures the proof photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// The selfie camera.
    Front,
    /// The rear camera.
    Back,
}

/// Parameters of a proof-photo capture.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Which camera to use.
    pub facing: CameraFacing,

    /// Compression quality, 0.0..=1.0.
    pub quality: f32,

    /// Whether the platform should also save the photo to the user's
    /// library. Proof photos stay private.
    pub save_to_photos: bool,
}

impl CaptureRequest {
    /// The attendance-proof shape: front camera, half quality, private.
    #[must_use]
    pub const fn selfie() -> Self {
        Self {
            facing: CameraFacing::Front,
            quality: 0.5,
            save_to_photos: false,
        }
    }
}

/// Result of a capture attempt.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// The user backed out.
    Cancelled,
    /// The camera reported an error.
    Failed(String),
    /// A photo was taken.
    Captured {
        /// Opaque handle to the stored image.
        photo_ref: String,
    },
}

/// The camera capture collaborator.
pub trait Camera {
    /// Take a photo, or report why not.
    async fn capture(&mut self, request: &CaptureRequest) -> CaptureOutcome;
}

/// A user decision the system needs before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Record this attendance action (a selfie will be required).
    RecordAttendance(EventKind),
    /// Erase the entire attendance history.
    ClearHistory,
}

/// The blocking confirmation dialog collaborator.
pub trait ConfirmationPrompt {
    /// Ask the user; `true` means proceed.
    async fn confirm(&mut self, request: &Confirmation) -> bool;
}

/// Owns the attendance log and the proximity-gated recording flow.
pub struct AttendanceManager<S> {
    store: S,
    config: AttendanceConfig,
    locations: LocationDirectory,
    profile: Option<UserProfile>,
    log: EventLog,
}

impl<S: KeyValueStore> AttendanceManager<S> {
    /// Load persisted state and build the manager.
    ///
    /// Missing, unreadable, or malformed persisted data recovers to an
    /// empty log (and no profile) with a warning; startup never fails on
    /// store contents.
    pub async fn load(store: S, config: AttendanceConfig, locations: LocationDirectory) -> Self {
        let log = match store.get(EVENT_LOG_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(error = %err, "stored attendance log is malformed, starting empty");
                EventLog::default()
            }),
            Ok(None) => EventLog::default(),
            Err(err) => {
                warn!(error = %err, "could not read attendance log, starting empty");
                EventLog::default()
            }
        };
        let profile = UserProfile::load(&store).await;
        Self {
            store,
            config,
            locations,
            profile,
            log,
        }
    }

    /// Current attendance status, derived from the log.
    #[must_use]
    pub fn toggle(&self) -> ToggleState {
        self.log.toggle()
    }

    /// Read-only view of the event log.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// The registered profile, if any.
    #[must_use]
    pub const fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Validate and persist the user's registration details.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] on bad input, or a store error
    /// when persisting fails.
    pub async fn register_profile(&mut self, full_name: &str, matrix_number: &str) -> Result<()> {
        let profile = UserProfile::new(full_name, matrix_number)?;
        profile.save(&mut self.store).await?;
        info!(matrix_number = %profile.matrix_number, "profile registered");
        self.profile = Some(profile);
        Ok(())
    }

    /// Record an attendance action against `beacon`.
    ///
    /// The flow is: proximity gate, explicit confirmation, selfie
    /// capture, then append-and-persist. The intended direction is the
    /// opposite of the current toggle state. No event is created unless
    /// the capture succeeds and the updated log is persisted.
    ///
    /// # Errors
    ///
    /// [`Error::TooFarToAct`] below the threshold,
    /// [`Error::ConfirmationDeclined`] / [`Error::CaptureCancelled`] /
    /// [`Error::CaptureFailed`] when the user or camera backs out, and
    /// store errors when persisting fails (the in-memory log is left
    /// unchanged).
    pub async fn request_attendance<P, C>(
        &mut self,
        beacon: &Beacon,
        prompt: &mut P,
        camera: &mut C,
    ) -> Result<AttendanceEvent>
    where
        P: ConfirmationPrompt,
        C: Camera,
    {
        if !is_near(beacon.rssi, self.config.rssi_threshold) {
            return Err(Error::TooFarToAct {
                rssi: beacon.rssi,
                threshold: self.config.rssi_threshold,
            });
        }

        let kind = self.toggle().next_action();
        if !prompt
            .confirm(&Confirmation::RecordAttendance(kind))
            .await
        {
            info!(?kind, "attendance not confirmed");
            return Err(Error::ConfirmationDeclined);
        }

        let photo_ref = match camera.capture(&CaptureRequest::selfie()).await {
            CaptureOutcome::Cancelled => {
                info!("selfie capture cancelled");
                return Err(Error::CaptureCancelled);
            }
            CaptureOutcome::Failed(message) => {
                warn!(%message, "selfie capture failed");
                return Err(Error::CaptureFailed(message));
            }
            CaptureOutcome::Captured { photo_ref } => photo_ref,
        };

        let event = self.build_event(kind, beacon, photo_ref);
        self.append(event).await
    }

    /// Erase the attendance history after explicit confirmation.
    ///
    /// Clearing resets the derived toggle to checked-out.
    ///
    /// # Errors
    ///
    /// [`Error::ConfirmationDeclined`] when the user backs out, or a
    /// store error when the persisted log cannot be removed.
    pub async fn clear_all<P: ConfirmationPrompt>(&mut self, prompt: &mut P) -> Result<()> {
        if !prompt.confirm(&Confirmation::ClearHistory).await {
            return Err(Error::ConfirmationDeclined);
        }
        self.store.remove(EVENT_LOG_KEY).await?;
        self.log = EventLog::default();
        info!("attendance history cleared");
        Ok(())
    }

    fn build_event(&self, kind: EventKind, beacon: &Beacon, photo_ref: String) -> AttendanceEvent {
        let now = Utc::now();
        let (user_name, matrix_number) = self.profile.as_ref().map_or_else(
            || (UNREGISTERED_NAME.to_string(), UNREGISTERED_MATRIX.to_string()),
            |profile| (profile.full_name.clone(), profile.matrix_number.clone()),
        );
        AttendanceEvent {
            id: Uuid::now_v7().to_string(),
            user_name,
            matrix_number,
            photo_ref,
            recorded_at_utc: now,
            timestamp: now
                .with_timezone(&self.config.timezone)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            kind,
            beacon_id: beacon.id.clone(),
            location: self.locations.resolve(&beacon.id).to_string(),
        }
    }

    /// Persist the updated log, then commit it in memory. A failed write
    /// leaves both the store and the in-memory log as they were.
    async fn append(&mut self, event: AttendanceEvent) -> Result<AttendanceEvent> {
        let updated = self.log.prepended(event.clone());
        let raw = serde_json::to_string(&updated)?;
        self.store.set(EVENT_LOG_KEY, &raw).await?;
        self.log = updated;
        info!(kind = ?event.kind, location = %event.location, "attendance recorded");
        Ok(event)
    }
}
