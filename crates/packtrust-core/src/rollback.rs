use crate::reason::ReasonCode;

/// Inputs of one anti-rollback / anti-freeze decision. Times are Unix
/// milliseconds; versions are monotone sequence numbers (see
/// [`crate::semver::Semver::sequence`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreezeCheck {
    pub incoming_version: i64,
    pub max_seen_version: i64,
    pub expires_at_ms: i64,
    pub now_ms: i64,
}

/// Checks run in a fixed order and the first violation wins.
///
/// Equal versions pass so an interrupted apply can be retried; a strictly
/// lower version never passes.
pub fn enforce(check: &FreezeCheck) -> Result<(), ReasonCode> {
    if check.incoming_version < 0 {
        return Err(ReasonCode::AntiRollbackInvalidIncoming);
    }
    if check.max_seen_version < 0 {
        return Err(ReasonCode::AntiRollbackInvalidMaxSeen);
    }
    if check.expires_at_ms <= 0 {
        return Err(ReasonCode::AntiFreezeInvalidExpiresAt);
    }
    if check.expires_at_ms <= check.now_ms {
        return Err(ReasonCode::AntiFreezeExpired);
    }
    if check.incoming_version < check.max_seen_version {
        return Err(ReasonCode::AntiRollbackDetected);
    }
    Ok(())
}
