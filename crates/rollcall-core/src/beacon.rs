//! Beacon observation model, registry, and signal-strength selection.
//!
//! This module provides:
//! - Normalization of raw radio advertisements into the strict [`Beacon`] shape
//! - A session-scoped [`BeaconRegistry`] keyed by hardware identifier
//! - [`select_active`] for picking the strongest-signal beacon
//! - [`is_near`] - the pure proximity gate

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Display name used when an advertiser broadcasts no usable name.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// A raw advertisement payload as delivered by a radio driver.
///
/// Drivers report loosely-shaped data: the name may arrive under either
/// field, and a sighting may carry no signal sample at all. Payloads are
/// normalized via [`Advertisement::normalize`] at the boundary; nothing
/// unnormalized reaches the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Advertisement {
    /// Stable hardware identifier of the advertiser.
    pub id: String,

    /// Device name, if the driver resolved one.
    pub name: Option<String>,

    /// Advertised local name, if present in the advertisement packet.
    pub local_name: Option<String>,

    /// Signal strength sample in dBm, if one was measured.
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Normalize into the strict beacon shape.
    ///
    /// Returns `None` when the payload carries no RSSI sample; a sighting
    /// without a reading cannot participate in proximity ranking. The
    /// display name falls back from `name` to `local_name` to
    /// [`UNKNOWN_DEVICE_NAME`].
    #[must_use]
    pub fn normalize(self) -> Option<Beacon> {
        let rssi = self.rssi?;
        let display_name = self
            .name
            .filter(|name| !name.is_empty())
            .or_else(|| self.local_name.filter(|name| !name.is_empty()))
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        Some(Beacon {
            id: self.id,
            display_name,
            rssi,
        })
    }
}

/// A BLE-advertising device observed with a signal-strength reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Stable hardware identifier. This is the beacon's identity.
    pub id: String,

    /// Human-readable name shown to the user.
    pub display_name: String,

    /// Latest signal strength in dBm, typically -100..0. Closer to zero
    /// means a stronger, nearer signal.
    pub rssi: i16,
}

/// The set of currently-visible beacons, keyed by hardware identifier.
///
/// The registry is session-scoped: it is cleared when scanning
/// (re)starts, never on stop, so the last-seen beacons remain visible
/// between sessions. Entries carry the latest RSSI sample; both the
/// discovery-event path and the reconciliation poll feed the same
/// [`upsert`](Self::upsert) and converge on the same state.
///
/// Iteration order is unspecified; consumers sort explicitly.
#[derive(Debug, Default)]
pub struct BeaconRegistry {
    entries: HashMap<String, Beacon>,
}

impl BeaconRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a sighting.
    ///
    /// A new identifier is always inserted. A known identifier is updated
    /// only when the fresh RSSI differs from the stored one, which
    /// suppresses redundant change notifications for consumers that watch
    /// the registry. Returns `true` when the stored entry changed.
    pub fn upsert(&mut self, beacon: Beacon) -> bool {
        match self.entries.get_mut(&beacon.id) {
            Some(existing) => {
                if existing.rssi == beacon.rssi {
                    return false;
                }
                trace!(id = %beacon.id, rssi = beacon.rssi, "beacon updated");
                *existing = beacon;
                true
            }
            None => {
                trace!(id = %beacon.id, rssi = beacon.rssi, "beacon sighted");
                self.entries.insert(beacon.id.clone(), beacon);
                true
            }
        }
    }

    /// Clear all entries. Called when a new scan session begins.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// The current set of visible beacons, in unspecified order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Beacon> {
        self.entries.values().cloned().collect()
    }

    /// Look up a beacon by hardware identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Beacon> {
        self.entries.get(id)
    }

    /// Number of visible beacons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no beacons are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Pick the beacon with the strongest signal.
///
/// RSSI is negative; numerically highest means nearest. Ties are broken
/// by the lexicographically smallest identifier so the result is stable
/// for a given input set. Returns `None` for an empty set.
#[must_use]
pub fn select_active(beacons: &[Beacon]) -> Option<&Beacon> {
    beacons.iter().reduce(|best, candidate| {
        if candidate.rssi > best.rssi || (candidate.rssi == best.rssi && candidate.id < best.id) {
            candidate
        } else {
            best
        }
    })
}

/// Whether a signal at `rssi` dBm counts as "close enough" against the
/// configured threshold. The boundary value is near.
#[inline]
#[must_use]
pub const fn is_near(rssi: i16, threshold: i16) -> bool {
    rssi >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(id: &str, rssi: i16) -> Beacon {
        Beacon {
            id: id.to_string(),
            display_name: format!("Beacon {id}"),
            rssi,
        }
    }

    #[test]
    fn test_normalize_prefers_resolved_name() {
        let beacon = Advertisement {
            id: "AA:BB:CC:DD:EE:FF".into(),
            name: Some("Room Beacon".into()),
            local_name: Some("ignored".into()),
            rssi: Some(-48),
        }
        .normalize()
        .unwrap();
        assert_eq!(beacon.display_name, "Room Beacon");
        assert_eq!(beacon.rssi, -48);
    }

    #[test]
    fn test_normalize_falls_back_to_local_name() {
        let beacon = Advertisement {
            id: "AA:BB:CC:DD:EE:FF".into(),
            name: None,
            local_name: Some("adv-name".into()),
            rssi: Some(-60),
        }
        .normalize()
        .unwrap();
        assert_eq!(beacon.display_name, "adv-name");
    }

    #[test]
    fn test_normalize_unknown_name_placeholder() {
        let beacon = Advertisement {
            id: "AA:BB:CC:DD:EE:FF".into(),
            name: Some(String::new()),
            local_name: None,
            rssi: Some(-60),
        }
        .normalize()
        .unwrap();
        assert_eq!(beacon.display_name, UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_normalize_drops_missing_rssi() {
        let advertisement = Advertisement {
            id: "AA:BB:CC:DD:EE:FF".into(),
            name: Some("Room Beacon".into()),
            local_name: None,
            rssi: None,
        };
        assert!(advertisement.normalize().is_none());
    }

    #[test]
    fn test_upsert_inserts_and_updates() {
        let mut registry = BeaconRegistry::new();
        assert!(registry.upsert(beacon("B1", -60)));
        assert_eq!(registry.len(), 1);

        assert!(registry.upsert(beacon("B1", -50)));
        assert_eq!(registry.get("B1").unwrap().rssi, -50);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_unchanged_rssi_is_suppressed() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(beacon("B1", -60));

        let mut renamed = beacon("B1", -60);
        renamed.display_name = "different".into();
        assert!(!registry.upsert(renamed));

        // Snapshot content for B1 is observably unchanged.
        assert_eq!(registry.get("B1").unwrap().display_name, "Beacon B1");
    }

    #[test]
    fn test_reset_clears_entries() {
        let mut registry = BeaconRegistry::new();
        registry.upsert(beacon("B1", -60));
        registry.upsert(beacon("B2", -70));
        registry.reset();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_select_active_picks_strongest() {
        let beacons = vec![beacon("B1", -80), beacon("B2", -42), beacon("B3", -60)];
        assert_eq!(select_active(&beacons).unwrap().id, "B2");
    }

    #[test]
    fn test_select_active_empty_set() {
        assert!(select_active(&[]).is_none());
    }

    #[test]
    fn test_select_active_tie_break_is_stable() {
        let forward = vec![beacon("B2", -50), beacon("B1", -50)];
        let reverse = vec![beacon("B1", -50), beacon("B2", -50)];
        assert_eq!(select_active(&forward).unwrap().id, "B1");
        assert_eq!(select_active(&reverse).unwrap().id, "B1");
    }

    #[test]
    fn test_is_near_boundary_is_near() {
        assert!(is_near(-55, -55));
        assert!(is_near(-50, -55));
        assert!(!is_near(-56, -55));
        assert!(!is_near(-70, -55));
    }
}
