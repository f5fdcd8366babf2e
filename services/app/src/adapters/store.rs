//! services/app/src/adapters/store.rs
//!
//! This module contains the file-backed state store, the concrete
//! implementation of the `StateStore` port from the `core` crate. It persists
//! the auth token, the serialized user record, and the anonymous usage
//! counter in a single JSON file so they survive restarts.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use newscheck_core::domain::UserRecord;
use newscheck_core::ports::{PortError, PortResult, StateStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

//=========================================================================================
// On-Disk Record
//=========================================================================================

/// Everything the client persists, in one file. Fields are independent: the
/// usage counter outlives the credential pair.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    token: Option<String>,
    user: Option<UserRecord>,
    #[serde(default)]
    usage_count: u32,
    saved_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A state store that keeps the client state in a JSON file.
#[derive(Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Creates a new `FileStateStore` over the given file path. The file is
    /// created lazily on the first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads and parses the state file. Structurally invalid content is
    /// discarded and replaced with an empty state rather than propagated.
    fn read(&self) -> StateFile {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return StateFile::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), "discarding corrupt state file: {e}");
                StateFile::default()
            }
        }
    }

    /// Writes the state file atomically: serialize to a sibling temp file,
    /// then rename over the target so a crash never leaves a torn file.
    fn write(&self, mut state: StateFile) -> PortResult<()> {
        state.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| PortError::Network(format!("failed to encode state file: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| PortError::Network(format!("failed to write state file: {e}")))
    }
}

//=========================================================================================
// `StateStore` Trait Implementation
//=========================================================================================

impl StateStore for FileStateStore {
    fn load_session(&self) -> Option<(String, UserRecord)> {
        let state = self.read();
        match (state.token, state.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some((token, user)),
            (None, None) => None,
            // One-sided state cannot satisfy the token-iff-user invariant;
            // treat it the same as corrupt data.
            _ => {
                warn!(path = %self.path.display(), "discarding one-sided persisted session");
                None
            }
        }
    }

    fn save_session(&self, token: &str, user: &UserRecord) -> PortResult<()> {
        let mut state = self.read();
        state.token = Some(token.to_string());
        state.user = Some(user.clone());
        self.write(state)
    }

    fn save_token(&self, token: &str) -> PortResult<()> {
        let mut state = self.read();
        state.token = Some(token.to_string());
        self.write(state)
    }

    fn clear_session(&self) -> PortResult<()> {
        let mut state = self.read();
        state.token = None;
        state.user = None;
        self.write(state)
    }

    fn load_usage_count(&self) -> u32 {
        self.read().usage_count
    }

    fn save_usage_count(&self, count: u32) -> PortResult<()> {
        let mut state = self.read();
        state.usage_count = count;
        self.write(state)
    }
}
