use crate::digest::Digest;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The node's active pointer plus its rollback high-water mark.
///
/// `max_seen_version` is the highest manifest version ever applied on this
/// node. It lives in the same file as the pointer so both move in one atomic
/// replace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutState {
    pub active_pack_id: Option<String>,
    pub active_manifest_digest: Option<Digest>,
    #[serde(default)]
    pub max_seen_version: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for RolloutState {
    fn default() -> Self {
        Self {
            active_pack_id: None,
            active_manifest_digest: None,
            max_seen_version: None,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }
}

/// Missing file reads as the zero value; anything else that goes wrong is an
/// error.
pub fn read(path: &Path) -> Result<RolloutState> {
    if !path.exists() {
        return Ok(RolloutState::default());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn write_atomic_durable(path: &Path, state: &RolloutState) -> Result<()> {
    crate::io::write_atomic_durable(path, &encode(state)?)
}

pub(crate) fn encode(state: &RolloutState) -> Result<Vec<u8>> {
    let mut data = serde_json::to_string_pretty(state)?;
    data.push('\n');
    Ok(data.into_bytes())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
