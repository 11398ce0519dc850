use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ReasonCode
// ---------------------------------------------------------------------------

/// Every verdict a trust or rollout gate can return.
///
/// The wire form (`as_str`, serde) is the stable code callers map to
/// user-facing diagnostics. `Display` carries the same code, except for the
/// anti-rollback / anti-freeze family which keeps its historical
/// `FAMILY: detail` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    #[error("APPLY_OK")]
    ApplyOk,
    #[error("APPLY_BLOCKED")]
    ApplyBlocked,

    // trust
    #[error("SIGNATURE_MISSING")]
    SignatureMissing,
    #[error("SIGNATURE_INVALID")]
    SignatureInvalid,
    #[error("HASH_MISMATCH")]
    HashMismatch,
    #[error("MANIFEST_MISSING")]
    ManifestMissing,
    #[error("MANIFEST_SCHEMA_INVALID")]
    ManifestSchemaInvalid,
    #[error("KEY_UNKNOWN")]
    KeyUnknown,
    #[error("KEY_REVOKED")]
    KeyRevoked,
    #[error("KEY_GRACE_EXPIRED")]
    KeyGraceExpired,

    // temporal
    #[error("EXPIRES_AT_INVALID")]
    ExpiresAtInvalid,
    #[error("EXPIRED_BLOCKED")]
    ExpiredBlocked,

    // version safety
    #[error("ANTI_ROLLBACK: invalid incomingVersion")]
    AntiRollbackInvalidIncoming,
    #[error("ANTI_ROLLBACK: invalid maxSeenVersion")]
    AntiRollbackInvalidMaxSeen,
    #[error("ANTI_FREEZE: invalid expiresAtMs")]
    AntiFreezeInvalidExpiresAt,
    #[error("ANTI_FREEZE: expired")]
    AntiFreezeExpired,
    #[error("ANTI_ROLLBACK: rollback_detected")]
    AntiRollbackDetected,

    // compatibility
    #[error("COMPAT_MISSING")]
    CompatMissing,
    #[error("COMPAT_SEMVER_INVALID")]
    CompatSemverInvalid,
    #[error("COMPAT_RUNTIME_TOO_LOW")]
    CompatRuntimeTooLow,
    #[error("COMPAT_GATEWAY_TOO_LOW")]
    CompatGatewayTooLow,

    #[error("REASON_CODE_UNKNOWN_BLOCKED")]
    ReasonCodeUnknownBlocked,
}

impl ReasonCode {
    pub fn all() -> &'static [ReasonCode] {
        &[
            ReasonCode::ApplyOk,
            ReasonCode::ApplyBlocked,
            ReasonCode::SignatureMissing,
            ReasonCode::SignatureInvalid,
            ReasonCode::HashMismatch,
            ReasonCode::ManifestMissing,
            ReasonCode::ManifestSchemaInvalid,
            ReasonCode::KeyUnknown,
            ReasonCode::KeyRevoked,
            ReasonCode::KeyGraceExpired,
            ReasonCode::ExpiresAtInvalid,
            ReasonCode::ExpiredBlocked,
            ReasonCode::AntiRollbackInvalidIncoming,
            ReasonCode::AntiRollbackInvalidMaxSeen,
            ReasonCode::AntiFreezeInvalidExpiresAt,
            ReasonCode::AntiFreezeExpired,
            ReasonCode::AntiRollbackDetected,
            ReasonCode::CompatMissing,
            ReasonCode::CompatSemverInvalid,
            ReasonCode::CompatRuntimeTooLow,
            ReasonCode::CompatGatewayTooLow,
            ReasonCode::ReasonCodeUnknownBlocked,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::ApplyOk => "APPLY_OK",
            ReasonCode::ApplyBlocked => "APPLY_BLOCKED",
            ReasonCode::SignatureMissing => "SIGNATURE_MISSING",
            ReasonCode::SignatureInvalid => "SIGNATURE_INVALID",
            ReasonCode::HashMismatch => "HASH_MISMATCH",
            ReasonCode::ManifestMissing => "MANIFEST_MISSING",
            ReasonCode::ManifestSchemaInvalid => "MANIFEST_SCHEMA_INVALID",
            ReasonCode::KeyUnknown => "KEY_UNKNOWN",
            ReasonCode::KeyRevoked => "KEY_REVOKED",
            ReasonCode::KeyGraceExpired => "KEY_GRACE_EXPIRED",
            ReasonCode::ExpiresAtInvalid => "EXPIRES_AT_INVALID",
            ReasonCode::ExpiredBlocked => "EXPIRED_BLOCKED",
            ReasonCode::AntiRollbackInvalidIncoming => "ANTI_ROLLBACK_INVALID_INCOMING",
            ReasonCode::AntiRollbackInvalidMaxSeen => "ANTI_ROLLBACK_INVALID_MAX_SEEN",
            ReasonCode::AntiFreezeInvalidExpiresAt => "ANTI_FREEZE_INVALID_EXPIRES_AT",
            ReasonCode::AntiFreezeExpired => "ANTI_FREEZE_EXPIRED",
            ReasonCode::AntiRollbackDetected => "ANTI_ROLLBACK_DETECTED",
            ReasonCode::CompatMissing => "COMPAT_MISSING",
            ReasonCode::CompatSemverInvalid => "COMPAT_SEMVER_INVALID",
            ReasonCode::CompatRuntimeTooLow => "COMPAT_RUNTIME_TOO_LOW",
            ReasonCode::CompatGatewayTooLow => "COMPAT_GATEWAY_TOO_LOW",
            ReasonCode::ReasonCodeUnknownBlocked => "REASON_CODE_UNKNOWN_BLOCKED",
        }
    }

    pub fn is_success(self) -> bool {
        self == ReasonCode::ApplyOk
    }
}

/// Returned when a wire string is not a known reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("REASON_CODE_INVALID:{0}")]
pub struct UnknownReasonCode(pub String);

impl std::str::FromStr for ReasonCode {
    type Err = UnknownReasonCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownReasonCode(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
