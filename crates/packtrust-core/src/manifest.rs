use crate::compat::CompatibilityRequirement;
use crate::digest::Digest;
use crate::error::{PackError, Result};
use crate::paths::{self, MANIFEST_FILE, SIGNATURE_FILE};
use crate::reason::ReasonCode;
use crate::semver::Semver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const MANIFEST_SCHEMA: &str = "MODEL_PACK_MANIFEST_V0";

// ---------------------------------------------------------------------------
// PackMeta (pack.json)
// ---------------------------------------------------------------------------

/// The part of `pack.json` the trust layer reads. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PackMeta {
    pub pack_id: String,
    pub version: String,
    #[serde(default)]
    pub compat: Option<CompatibilityRequirement>,
}

impl PackMeta {
    pub fn load(pack_dir: &Path) -> Result<Self> {
        let path = paths::pack_file(pack_dir);
        if !path.exists() {
            return Err(PackError::PackJsonMissing(pack_dir.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let meta: PackMeta =
            serde_json::from_str(&data).map_err(|e| PackError::PackJsonInvalid(e.to_string()))?;
        paths::validate_id(&meta.pack_id)?;
        if Semver::parse_pack_version(&meta.version).is_none() {
            return Err(PackError::InvalidVersion(meta.version));
        }
        Ok(meta)
    }
}

// ---------------------------------------------------------------------------
// ModelPackManifest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: Digest,
}

/// Immutable description of one pack version. `files` is sorted by path and
/// free of duplicates so the canonical form is reproducible across builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPackManifest {
    pub schema_name: String,
    pub pack_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compat: Option<CompatibilityRequirement>,
    pub created_at_utc: DateTime<Utc>,
    pub files: Vec<ManifestEntry>,
}

impl ModelPackManifest {
    pub fn semver(&self) -> Option<Semver> {
        Semver::parse_pack_version(&self.version)
    }

    /// The exact bytes that get signed and fingerprinted.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        crate::canon::canonicalize_serde(self)
    }

    pub fn fingerprint(&self) -> Result<Digest> {
        Ok(Digest::of(&self.canonical_bytes()?))
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_name != MANIFEST_SCHEMA {
            return Err(PackError::ManifestInvalid(format!(
                "unexpected schema_name '{}'",
                self.schema_name
            )));
        }
        paths::validate_id(&self.pack_id)
            .map_err(|_| PackError::ManifestInvalid(format!("invalid pack_id '{}'", self.pack_id)))?;
        if self.semver().is_none() {
            return Err(PackError::ManifestInvalid(format!(
                "invalid version '{}'",
                self.version
            )));
        }
        for entry in &self.files {
            if !is_safe_relative(&entry.path) {
                return Err(PackError::ManifestInvalid(format!(
                    "unsafe file path '{}'",
                    entry.path
                )));
            }
        }
        for pair in self.files.windows(2) {
            if pair[0].path >= pair[1].path {
                return Err(PackError::ManifestInvalid(format!(
                    "files not strictly sorted at '{}'",
                    pair[1].path
                )));
            }
        }
        Ok(())
    }
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Hash every file of the pack (except the manifest and signature
/// themselves) into a manifest. `created_at` is supplied by the caller so a
/// rebuild over identical files yields identical canonical bytes.
pub fn build_manifest(pack_dir: &Path, created_at: DateTime<Utc>) -> Result<ModelPackManifest> {
    if !pack_dir.is_dir() {
        return Err(PackError::PackDirNotFound(pack_dir.display().to_string()));
    }
    let meta = PackMeta::load(pack_dir)?;
    let files = collect_files(pack_dir)?;
    debug!(pack_id = %meta.pack_id, files = files.len(), "manifest built");
    Ok(ModelPackManifest {
        schema_name: MANIFEST_SCHEMA.to_string(),
        pack_id: meta.pack_id,
        version: meta.version,
        compat: meta.compat,
        created_at_utc: created_at,
        files,
    })
}

pub fn write_manifest(pack_dir: &Path, manifest: &ModelPackManifest) -> Result<()> {
    let mut data = serde_json::to_string_pretty(manifest)?;
    data.push('\n');
    crate::io::write_atomic_durable(&paths::manifest_path(pack_dir), data.as_bytes())
}

pub fn load_manifest(pack_dir: &Path) -> Result<ModelPackManifest> {
    let path = paths::manifest_path(pack_dir);
    if !path.exists() {
        return Err(PackError::ManifestMissing(pack_dir.display().to_string()));
    }
    let data = std::fs::read_to_string(&path)?;
    let manifest: ModelPackManifest =
        serde_json::from_str(&data).map_err(|e| PackError::ManifestInvalid(e.to_string()))?;
    manifest.validate()?;
    Ok(manifest)
}

fn collect_files(pack_dir: &Path) -> Result<Vec<ManifestEntry>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(pack_dir).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = relative_path(pack_dir, entry.path())?;
        if rel == MANIFEST_FILE || rel == SIGNATURE_FILE {
            continue;
        }
        if !entry.file_type().is_file() {
            return Err(PackError::UnsupportedEntry(rel));
        }
        files.push(ManifestEntry {
            sha256: Digest::of_file(entry.path())?,
            path: rel,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// `/`-separated path of `path` below `base`, independent of the platform.
fn relative_path(base: &Path, path: &Path) -> Result<String> {
    let unsupported = || PackError::UnsupportedEntry(path.display().to_string());
    let rel = path.strip_prefix(base).map_err(|_| unsupported())?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(unsupported)?),
            _ => return Err(unsupported()),
        }
    }
    Ok(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Re-verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum FileMismatch {
    Missing(String),
    Changed(String),
    Unlisted(String),
}

/// Compare the files on disk with the manifest. An empty result means every
/// listed file is present with the recorded digest and nothing else exists.
pub fn diff_files(pack_dir: &Path, manifest: &ModelPackManifest) -> Result<Vec<FileMismatch>> {
    let on_disk: BTreeMap<String, Digest> = collect_files(pack_dir)?
        .into_iter()
        .map(|e| (e.path, e.sha256))
        .collect();
    let listed: BTreeMap<&str, &Digest> = manifest
        .files
        .iter()
        .map(|e| (e.path.as_str(), &e.sha256))
        .collect();

    let mut mismatches = Vec::new();
    for (path, digest) in &listed {
        match on_disk.get(*path) {
            None => mismatches.push(FileMismatch::Missing(path.to_string())),
            Some(actual) if actual != *digest => {
                mismatches.push(FileMismatch::Changed(path.to_string()))
            }
            Some(_) => {}
        }
    }
    for path in on_disk.keys() {
        if !listed.contains_key(path.as_str()) {
            mismatches.push(FileMismatch::Unlisted(path.clone()));
        }
    }
    Ok(mismatches)
}

/// Gate form of [`diff_files`]. A pack that cannot be walked is treated as
/// a mismatch.
pub fn verify_files(pack_dir: &Path, manifest: &ModelPackManifest) -> std::result::Result<(), ReasonCode> {
    match diff_files(pack_dir, manifest) {
        Ok(mismatches) if mismatches.is_empty() => Ok(()),
        Ok(mismatches) => {
            warn!(pack_id = %manifest.pack_id, mismatches = mismatches.len(), "pack files do not match manifest");
            Err(ReasonCode::HashMismatch)
        }
        Err(e) => {
            warn!(pack_id = %manifest.pack_id, error = %e, "pack files could not be read");
            Err(ReasonCode::HashMismatch)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
