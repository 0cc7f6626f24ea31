//! User registration data.
//!
//! A single profile identifies the person whose attendance is being
//! recorded. It is created through an explicit registration step and
//! persisted; until one exists, recorded events carry the placeholder
//! identity.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::storage::{KeyValueStore, USER_PROFILE_KEY};

/// Name recorded on events when no profile is registered.
pub const UNREGISTERED_NAME: &str = "Unknown";

/// Matrix number recorded on events when no profile is registered.
pub const UNREGISTERED_MATRIX: &str = "N/A";

const MIN_NAME_CHARS: usize = 2;
const MIN_MATRIX_CHARS: usize = 5;

/// The registered user's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's full name.
    pub full_name: String,

    /// The user's matrix (student) number.
    pub matrix_number: String,
}

impl UserProfile {
    /// Build a validated profile from raw form input.
    ///
    /// Both fields are trimmed before validation; the name must be at
    /// least 2 characters and the matrix number at least 5.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] naming the offending field.
    pub fn new(full_name: &str, matrix_number: &str) -> Result<Self> {
        let full_name = full_name.trim();
        if full_name.chars().count() < MIN_NAME_CHARS {
            return Err(Error::InvalidProfile {
                field: "full_name",
                message: format!("at least {MIN_NAME_CHARS} characters are required"),
            });
        }
        let matrix_number = matrix_number.trim();
        if matrix_number.chars().count() < MIN_MATRIX_CHARS {
            return Err(Error::InvalidProfile {
                field: "matrix_number",
                message: format!("at least {MIN_MATRIX_CHARS} characters are required"),
            });
        }
        Ok(Self {
            full_name: full_name.to_string(),
            matrix_number: matrix_number.to_string(),
        })
    }

    /// Load the persisted profile.
    ///
    /// Returns `None` when nothing is stored; an unreadable store or a
    /// malformed payload also reads as `None` (with a warning) rather
    /// than failing startup.
    pub async fn load<S: KeyValueStore>(store: &S) -> Option<Self> {
        match store.get(USER_PROFILE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    warn!(error = %err, "stored profile is malformed, ignoring it");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "could not read stored profile");
                None
            }
        }
    }

    /// Persist this profile.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn save<S: KeyValueStore>(&self, store: &mut S) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        store.set(USER_PROFILE_KEY, &raw).await?;
        Ok(())
    }
}
