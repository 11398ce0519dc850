use crate::digest::Digest;
use crate::error::{PackError, Result};
use crate::keys::KeyRegistry;
use crate::manifest::{self, ModelPackManifest};
use crate::paths;
use crate::reason::ReasonCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const SIGNATURE_SCHEMA: &str = "MODEL_PACK_SIGNATURE_V0";

/// Serde adapter for byte fields stored as standard base64 text.
pub mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signer / verifier seams
// ---------------------------------------------------------------------------

pub trait PackSigner {
    fn sign(&self, message: &[u8]) -> Vec<u8>;
    fn public_key(&self) -> Vec<u8>;
}

pub trait PackVerifier {
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool;
}

pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// `encoded` is the standard base64 form of a 32-byte seed.
    pub fn from_seed_b64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| PackError::InvalidSigningKey("seed is not valid base64".to_string()))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            PackError::InvalidSigningKey("seed must decode to 32 bytes".to_string())
        })?;
        Ok(Self::from_seed(seed))
    }
}

impl PackSigner for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_bytes().to_vec()
    }

    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().as_bytes().to_vec()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl PackVerifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
        let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        key.verify_strict(message, &signature).is_ok()
    }
}

/// First 16 hex chars of SHA-256 over the base64 public key.
pub fn default_key_id(public_key: &[u8]) -> String {
    let encoded = STANDARD.encode(public_key);
    Digest::of(encoded.as_bytes()).to_hex()[..16].to_string()
}

// ---------------------------------------------------------------------------
// signature.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureFile {
    pub schema_name: String,
    pub key_id: String,
    pub signature_b64: String,
    pub public_key_b64: String,
    pub signed_at_utc: DateTime<Utc>,
}

pub fn load_signature(pack_dir: &Path) -> Result<SignatureFile> {
    let path = paths::signature_path(pack_dir);
    if !path.exists() {
        return Err(PackError::SignatureMissing(pack_dir.display().to_string()));
    }
    let data = std::fs::read_to_string(&path)?;
    let file: SignatureFile =
        serde_json::from_str(&data).map_err(|e| PackError::SignatureInvalid(e.to_string()))?;
    if file.schema_name != SIGNATURE_SCHEMA {
        return Err(PackError::SignatureInvalid(format!(
            "unexpected schema_name '{}'",
            file.schema_name
        )));
    }
    Ok(file)
}

/// Sign the pack's existing manifest and write `signature.json`. The
/// signature is checked with `verifier` before anything is written.
pub fn sign_pack(
    pack_dir: &Path,
    signer: &dyn PackSigner,
    verifier: &dyn PackVerifier,
    key_id: Option<&str>,
    signed_at: DateTime<Utc>,
) -> Result<SignatureFile> {
    let manifest = manifest::load_manifest(pack_dir)?;
    let message = manifest.canonical_bytes()?;
    let public_key = signer.public_key();
    let key_id = match key_id {
        Some(id) => {
            paths::validate_id(id)?;
            id.to_string()
        }
        None => default_key_id(&public_key),
    };

    let signature = signer.sign(&message);
    if !verifier.verify(&message, &signature, &public_key) {
        return Err(PackError::SelfVerifyFailed(key_id));
    }

    let file = SignatureFile {
        schema_name: SIGNATURE_SCHEMA.to_string(),
        key_id,
        signature_b64: STANDARD.encode(&signature),
        public_key_b64: STANDARD.encode(&public_key),
        signed_at_utc: signed_at,
    };
    let mut data = serde_json::to_string_pretty(&file)?;
    data.push('\n');
    crate::io::write_atomic_durable(&paths::signature_path(pack_dir), data.as_bytes())?;
    debug!(pack_id = %manifest.pack_id, key_id = %file.key_id, "pack signed");
    Ok(file)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// The trust verdict handed to the apply orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Rejected(ReasonCode),
}

impl Verification {
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }

    pub fn reason_code(self) -> Option<ReasonCode> {
        match self {
            Verification::Verified => None,
            Verification::Rejected(code) => Some(code),
        }
    }
}

/// Everything learned while verifying a pack. Fields are filled as far as
/// verification got before a rejection.
#[derive(Debug, Clone)]
pub struct VerifiedPack {
    pub verification: Verification,
    pub manifest: Option<ModelPackManifest>,
    pub manifest_digest: Option<Digest>,
    pub key_id: Option<String>,
}

impl VerifiedPack {
    fn rejected(code: ReasonCode) -> Self {
        Self {
            verification: Verification::Rejected(code),
            manifest: None,
            manifest_digest: None,
            key_id: None,
        }
    }

    fn reject(mut self, code: ReasonCode) -> Self {
        warn!(
            pack_id = self.manifest.as_ref().map(|m| m.pack_id.as_str()).unwrap_or(""),
            key_id = self.key_id.as_deref().unwrap_or(""),
            reason_code = code.as_str(),
            "pack verification rejected"
        );
        self.verification = Verification::Rejected(code);
        self
    }
}

/// Verify a pack directory against the key registry at `now_ms`.
///
/// Policy failures come back as a rejected verdict. Only I/O problems other
/// than a missing manifest or signature file are returned as errors.
pub fn verify_pack(
    pack_dir: &Path,
    registry: &KeyRegistry,
    verifier: &dyn PackVerifier,
    now_ms: i64,
) -> Result<VerifiedPack> {
    let manifest = match manifest::load_manifest(pack_dir) {
        Ok(m) => m,
        Err(PackError::ManifestMissing(_)) => {
            return Ok(VerifiedPack::rejected(ReasonCode::ManifestMissing))
        }
        Err(PackError::ManifestInvalid(_)) => {
            return Ok(VerifiedPack::rejected(ReasonCode::ManifestSchemaInvalid))
        }
        Err(e) => return Err(e),
    };
    let message = match manifest.canonical_bytes() {
        Ok(bytes) => bytes,
        Err(PackError::Canon(_)) => {
            return Ok(VerifiedPack::rejected(ReasonCode::ManifestSchemaInvalid))
        }
        Err(e) => return Err(e),
    };

    let mut out = VerifiedPack {
        verification: Verification::Verified,
        manifest_digest: Some(Digest::of(&message)),
        manifest: Some(manifest),
        key_id: None,
    };

    let sig_file = match load_signature(pack_dir) {
        Ok(f) => f,
        Err(PackError::SignatureMissing(_)) => return Ok(out.reject(ReasonCode::SignatureMissing)),
        Err(PackError::SignatureInvalid(_)) => return Ok(out.reject(ReasonCode::SignatureInvalid)),
        Err(e) => return Err(e),
    };
    out.key_id = Some(sig_file.key_id.clone());

    let record = match registry.can_verify_with(&sig_file.key_id, now_ms) {
        Ok(r) => r,
        Err(code) => return Ok(out.reject(code)),
    };

    let embedded = STANDARD.decode(sig_file.public_key_b64.trim());
    if embedded.as_deref().ok() != Some(record.public_key.as_slice()) {
        return Ok(out.reject(ReasonCode::SignatureInvalid));
    }
    let Ok(signature) = STANDARD.decode(sig_file.signature_b64.trim()) else {
        return Ok(out.reject(ReasonCode::SignatureInvalid));
    };
    if !verifier.verify(&message, &signature, &record.public_key) {
        return Ok(out.reject(ReasonCode::SignatureInvalid));
    }

    if let Some(m) = out.manifest.as_ref() {
        if let Err(code) = manifest::verify_files(pack_dir, m) {
            return Ok(out.reject(code));
        }
    }

    debug!(key_id = %sig_file.key_id, "pack verified");
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
