//! Scripted collaborator doubles shared by the unit tests.

use std::collections::{HashSet, VecDeque};

use crate::attendance::{Camera, CaptureOutcome, CaptureRequest, Confirmation, ConfirmationPrompt};
use crate::beacon::{Advertisement, Beacon};
use crate::bluetooth::{
    Permission, PermissionDecision, PermissionGate, RadioDriver, RadioError, RadioState,
    ScanRequest, StartOptions,
};
use crate::storage::{KeyValueStore, MemoryStore, StoreError};

/// Route tracing output through the test harness. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn advertisement(id: &str, rssi: i16) -> Advertisement {
    Advertisement {
        id: id.to_string(),
        name: Some(format!("Beacon {id}")),
        local_name: None,
        rssi: Some(rssi),
    }
}

pub fn beacon(id: &str, rssi: i16) -> Beacon {
    advertisement(id, rssi).normalize().expect("has rssi")
}

/// Radio driver double with scripted failures and snapshots.
pub struct ScriptedRadio {
    pub started: bool,
    pub state: RadioState,
    pub fail_start: bool,
    pub fail_enable: bool,
    pub fail_scan: bool,
    pub fail_snapshot: bool,
    pub scan_requests: Vec<ScanRequest>,
    pub snapshots: VecDeque<Vec<Advertisement>>,
    pub snapshot_calls: usize,
}

impl ScriptedRadio {
    /// A healthy radio: on, and everything succeeds.
    pub fn ready() -> Self {
        Self {
            started: false,
            state: RadioState::On,
            fail_start: false,
            fail_enable: false,
            fail_scan: false,
            fail_snapshot: false,
            scan_requests: Vec::new(),
            snapshots: VecDeque::new(),
            snapshot_calls: 0,
        }
    }
}

impl RadioDriver for ScriptedRadio {
    async fn start(&mut self, _options: &StartOptions) -> Result<(), RadioError> {
        if self.fail_start {
            return Err(RadioError::StartFailed("scripted".into()));
        }
        self.started = true;
        Ok(())
    }

    async fn enable_radio(&mut self) -> Result<(), RadioError> {
        if self.fail_enable {
            return Err(RadioError::EnableFailed("scripted".into()));
        }
        Ok(())
    }

    async fn radio_state(&mut self) -> RadioState {
        self.state
    }

    async fn scan(&mut self, request: &ScanRequest) -> Result<(), RadioError> {
        if self.fail_scan {
            return Err(RadioError::ScanRequestFailed("scripted".into()));
        }
        self.scan_requests.push(request.clone());
        Ok(())
    }

    async fn discovered_snapshot(&mut self) -> Result<Vec<Advertisement>, RadioError> {
        if self.fail_snapshot {
            return Err(RadioError::SnapshotFailed("scripted".into()));
        }
        self.snapshot_calls += 1;
        Ok(self.snapshots.pop_front().unwrap_or_default())
    }
}

/// Permission gate double recording what was requested.
pub struct ScriptedGate {
    pub api_level: u32,
    pub denied: HashSet<Permission>,
    pub requested: Vec<Permission>,
}

impl ScriptedGate {
    /// A gate that grants everything at the given API level.
    pub fn granting(api_level: u32) -> Self {
        Self {
            api_level,
            denied: HashSet::new(),
            requested: Vec::new(),
        }
    }

    /// Deny one specific permission.
    pub fn denying(mut self, permission: Permission) -> Self {
        self.denied.insert(permission);
        self
    }
}

impl PermissionGate for ScriptedGate {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    async fn request(&mut self, permission: Permission) -> PermissionDecision {
        self.requested.push(permission);
        if self.denied.contains(&permission) {
            PermissionDecision::Denied
        } else {
            PermissionDecision::Granted
        }
    }
}

/// Camera double with a fixed outcome.
pub struct ScriptedCamera {
    outcome: CaptureOutcome,
    pub calls: usize,
    pub requests: Vec<CaptureRequest>,
}

impl ScriptedCamera {
    pub fn capturing(photo_ref: &str) -> Self {
        Self {
            outcome: CaptureOutcome::Captured {
                photo_ref: photo_ref.to_string(),
            },
            calls: 0,
            requests: Vec::new(),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            outcome: CaptureOutcome::Cancelled,
            calls: 0,
            requests: Vec::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: CaptureOutcome::Failed(message.to_string()),
            calls: 0,
            requests: Vec::new(),
        }
    }
}

impl Camera for ScriptedCamera {
    async fn capture(&mut self, request: &CaptureRequest) -> CaptureOutcome {
        self.calls += 1;
        self.requests.push(request.clone());
        self.outcome.clone()
    }
}

/// Confirmation prompt double with a fixed answer.
pub struct ScriptedPrompt {
    answer: bool,
    pub asked: Vec<Confirmation>,
}

impl ScriptedPrompt {
    pub fn accepting() -> Self {
        Self {
            answer: true,
            asked: Vec::new(),
        }
    }

    pub fn declining() -> Self {
        Self {
            answer: false,
            asked: Vec::new(),
        }
    }
}

impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&mut self, request: &Confirmation) -> bool {
        self.asked.push(*request);
        self.answer
    }
}

/// Store double whose writes can be scripted to fail.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: bool,
}

impl FlakyStore {
    pub fn failing_writes() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_writes: true,
        }
    }
}

impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                key: key.to_string(),
                source: std::io::Error::other("scripted write failure"),
            });
        }
        self.inner.set(key, value).await
    }

    async fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                key: key.to_string(),
                source: std::io::Error::other("scripted write failure"),
            });
        }
        self.inner.remove(key).await
    }
}
