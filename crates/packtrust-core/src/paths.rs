use crate::error::{PackError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Node directory constants
// ---------------------------------------------------------------------------

pub const PACKTRUST_DIR: &str = ".packtrust";
pub const CONFIG_FILE: &str = ".packtrust/config.yaml";
pub const DEFAULT_STATE_FILE: &str = ".packtrust/rollout_state.json";
pub const DEFAULT_KEYRING_FILE: &str = ".packtrust/keys.json";
pub const DEFAULT_AUDIT_FILE: &str = ".packtrust/audit.jsonl";

// ---------------------------------------------------------------------------
// Pack directory constants
// ---------------------------------------------------------------------------

pub const PACK_FILE: &str = "pack.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "signature.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn packtrust_dir(root: &Path) -> PathBuf {
    root.join(PACKTRUST_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn pack_file(pack_dir: &Path) -> PathBuf {
    pack_dir.join(PACK_FILE)
}

pub fn manifest_path(pack_dir: &Path) -> PathBuf {
    pack_dir.join(MANIFEST_FILE)
}

pub fn signature_path(pack_dir: &Path) -> PathBuf {
    pack_dir.join(SIGNATURE_FILE)
}

/// Relative configured paths resolve against the node root.
pub fn resolve(root: &Path, configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

// ---------------------------------------------------------------------------
// Identifier validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]{1,128}$").unwrap())
}

/// Pack ids and key ids end up in file names, logs and audit lines.
pub fn validate_id(id: &str) -> Result<()> {
    if !id_re().is_match(id) || id == "." || id == ".." {
        return Err(PackError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
