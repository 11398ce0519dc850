use thiserror::Error;

/// Operational failures. Policy verdicts are [`crate::reason::ReasonCode`]s and
/// never travel through this type.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("not initialized: run 'packtrust init'")]
    NotInitialized,

    #[error("pack directory not found: {0}")]
    PackDirNotFound(String),

    #[error("pack.json not found in {0}")]
    PackJsonMissing(String),

    #[error("invalid pack.json: {0}")]
    PackJsonInvalid(String),

    #[error("manifest.json not found in {0}")]
    ManifestMissing(String),

    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("signature.json not found in {0}")]
    SignatureMissing(String),

    #[error("invalid signature file: {0}")]
    SignatureInvalid(String),

    #[error("unsupported entry in pack (only regular files are allowed): {0}")]
    UnsupportedEntry(String),

    #[error("invalid identifier '{0}': must match [A-Za-z0-9._-]{{1,128}}")]
    InvalidId(String),

    #[error("invalid version '{0}': expected strict MAJOR.MINOR.PATCH")]
    InvalidVersion(String),

    #[error("invalid digest '{0}': expected 64 hex characters")]
    InvalidDigest(String),

    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("invalid key ring: {0}")]
    KeyringInvalid(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("key '{0}' is revoked and cannot be replaced")]
    KeyRevokedTerminal(String),

    #[error("signature self-check failed for key '{0}'")]
    SelfVerifyFailed(String),

    #[error(transparent)]
    Canon(#[from] crate::canon::CanonError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, PackError>;
