use crate::compat::{self, NodeVersions};
use crate::config::Policy;
use crate::digest::Digest;
use crate::error::Result;
use crate::keys::KeyRegistry;
use crate::manifest::ModelPackManifest;
use crate::reason::ReasonCode;
use crate::rollback::{self, FreezeCheck};
use crate::semver::Semver;
use crate::signature::{Verification, VerifiedPack};
use crate::store::{self, RolloutState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// ApplyRequest / ApplyDecision
// ---------------------------------------------------------------------------

/// One apply attempt. `verification` comes from outside the orchestrator;
/// nothing here re-checks the signature bytes.
#[derive(Debug, Clone)]
pub struct ApplyRequest<'m> {
    pub manifest: &'m ModelPackManifest,
    pub verification: Verification,
    pub key_id: Option<String>,
    pub pack_id: String,
    pub manifest_digest: Digest,
    pub expires_at_ms: i64,
    pub now_ms: i64,
}

impl<'m> ApplyRequest<'m> {
    /// Request for `manifest` with its own pack id and fingerprint.
    pub fn for_manifest(
        manifest: &'m ModelPackManifest,
        verification: Verification,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> Result<Self> {
        Ok(Self {
            manifest,
            verification,
            key_id: None,
            pack_id: manifest.pack_id.clone(),
            manifest_digest: manifest.fingerprint()?,
            expires_at_ms,
            now_ms,
        })
    }

    /// `None` when verification stopped before a manifest was loaded.
    pub fn from_verified(verified: &'m VerifiedPack, expires_at_ms: i64, now_ms: i64) -> Option<Self> {
        let manifest = verified.manifest.as_ref()?;
        let manifest_digest = verified.manifest_digest?;
        Some(Self {
            manifest,
            verification: verified.verification,
            key_id: verified.key_id.clone(),
            pack_id: manifest.pack_id.clone(),
            manifest_digest,
            expires_at_ms,
            now_ms,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDecision {
    pub applied: bool,
    pub reason_code: ReasonCode,
    pub active_pack_id: Option<String>,
    pub active_manifest_digest: Option<Digest>,
}

impl ApplyDecision {
    /// A blocked decision reports the pointer that stays in force.
    pub fn blocked(reason_code: ReasonCode, current: &RolloutState) -> Self {
        Self {
            applied: false,
            reason_code,
            active_pack_id: current.active_pack_id.clone(),
            active_manifest_digest: current.active_manifest_digest,
        }
    }

    fn applied(state: &RolloutState) -> Self {
        Self {
            applied: true,
            reason_code: ReasonCode::ApplyOk,
            active_pack_id: state.active_pack_id.clone(),
            active_manifest_digest: state.active_manifest_digest,
        }
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// One step of the apply chain. Gates are pure: they read the request and
/// the persisted state and never write.
pub trait Gate {
    fn name(&self) -> &'static str;
    fn check(&self, request: &ApplyRequest<'_>, current: &RolloutState) -> std::result::Result<(), ReasonCode>;
}

/// Passes the external verification verdict through.
pub struct TrustGate;

impl Gate for TrustGate {
    fn name(&self) -> &'static str {
        "trust"
    }

    fn check(&self, request: &ApplyRequest<'_>, _: &RolloutState) -> std::result::Result<(), ReasonCode> {
        match request.verification {
            Verification::Verified => Ok(()),
            Verification::Rejected(code) => Err(code),
        }
    }
}

/// Also rejects a `now_ms` that cannot be recorded as `updated_at`.
pub struct ExpiryGate;

impl Gate for ExpiryGate {
    fn name(&self) -> &'static str {
        "expiry"
    }

    fn check(&self, request: &ApplyRequest<'_>, _: &RolloutState) -> std::result::Result<(), ReasonCode> {
        if request.expires_at_ms <= 0 {
            return Err(ReasonCode::ExpiresAtInvalid);
        }
        if decision_time(request.now_ms).is_none() {
            return Err(ReasonCode::ExpiresAtInvalid);
        }
        if request.now_ms > request.expires_at_ms {
            return Err(ReasonCode::ExpiredBlocked);
        }
        Ok(())
    }
}

/// Re-checks the signing key at apply time, so a key revoked between
/// verification and apply still blocks.
pub struct KeyGate<'r> {
    pub registry: &'r KeyRegistry,
}

impl Gate for KeyGate<'_> {
    fn name(&self) -> &'static str {
        "key"
    }

    fn check(&self, request: &ApplyRequest<'_>, _: &RolloutState) -> std::result::Result<(), ReasonCode> {
        let key_id = request.key_id.as_deref().ok_or(ReasonCode::SignatureMissing)?;
        self.registry.can_verify_with(key_id, request.now_ms).map(|_| ())
    }
}

pub struct CompatGate {
    pub node: NodeVersions,
}

impl Gate for CompatGate {
    fn name(&self) -> &'static str {
        "compat"
    }

    fn check(&self, request: &ApplyRequest<'_>, _: &RolloutState) -> std::result::Result<(), ReasonCode> {
        compat::check(
            request.manifest.compat.as_ref(),
            &self.node.runtime,
            &self.node.gateway,
        )
    }
}

/// Anti-rollback against the persisted high-water mark, plus anti-freeze on
/// the request's expiry. A node that never applied anything has mark 0.
pub struct RollbackGate;

impl Gate for RollbackGate {
    fn name(&self) -> &'static str {
        "rollback"
    }

    fn check(&self, request: &ApplyRequest<'_>, current: &RolloutState) -> std::result::Result<(), ReasonCode> {
        let incoming_version = request
            .manifest
            .semver()
            .and_then(|v| v.sequence())
            .ok_or(ReasonCode::AntiRollbackInvalidIncoming)?;
        let max_seen_version = match current.max_seen_version.as_deref() {
            None => 0,
            Some(s) => Semver::parse_strict(s)
                .and_then(|v| v.sequence())
                .ok_or(ReasonCode::AntiRollbackInvalidMaxSeen)?,
        };
        rollback::enforce(&FreezeCheck {
            incoming_version,
            max_seen_version,
            expires_at_ms: request.expires_at_ms,
            now_ms: request.now_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs its gates in order and commits the new state only when all pass.
pub struct Orchestrator<'r> {
    state_path: PathBuf,
    gates: Vec<Box<dyn Gate + 'r>>,
}

impl<'r> Orchestrator<'r> {
    /// Trust and expiry only.
    pub fn minimal(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            gates: vec![Box::new(TrustGate), Box::new(ExpiryGate)],
        }
    }

    /// Trust, key, expiry, then compat and rollback as `policy` enables them.
    pub fn standard(
        state_path: impl Into<PathBuf>,
        registry: &'r KeyRegistry,
        node: NodeVersions,
        policy: &Policy,
    ) -> Self {
        let mut gates: Vec<Box<dyn Gate + 'r>> = vec![
            Box::new(TrustGate),
            Box::new(KeyGate { registry }),
            Box::new(ExpiryGate),
        ];
        if policy.enforce_compat {
            gates.push(Box::new(CompatGate { node }));
        }
        if policy.enforce_anti_rollback {
            gates.push(Box::new(RollbackGate));
        }
        Self {
            state_path: state_path.into(),
            gates,
        }
    }

    pub fn with_gate(mut self, gate: impl Gate + 'r) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn gate_names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Blocked decisions perform no write. An error means the gates passed
    /// but the new state could not be persisted.
    pub fn apply(&self, request: &ApplyRequest<'_>) -> Result<ApplyDecision> {
        let current = store::read(&self.state_path)?;

        for gate in &self.gates {
            if let Err(code) = gate.check(request, &current) {
                warn!(
                    pack_id = %request.pack_id,
                    manifest_digest = %request.manifest_digest,
                    gate = gate.name(),
                    reason_code = code.as_str(),
                    "apply blocked"
                );
                return Ok(ApplyDecision::blocked(code, &current));
            }
            debug!(gate = gate.name(), pack_id = %request.pack_id, "gate passed");
        }

        let Some(updated_at) = decision_time(request.now_ms) else {
            warn!(pack_id = %request.pack_id, now_ms = request.now_ms, "apply blocked: now_ms out of range");
            return Ok(ApplyDecision::blocked(ReasonCode::ExpiresAtInvalid, &current));
        };
        let next = RolloutState {
            active_pack_id: Some(request.pack_id.clone()),
            active_manifest_digest: Some(request.manifest_digest),
            max_seen_version: next_max_seen(
                current.max_seen_version.as_deref(),
                &request.manifest.version,
            ),
            updated_at,
        };
        store::write_atomic_durable(&self.state_path, &next)?;
        info!(
            pack_id = %request.pack_id,
            manifest_digest = %request.manifest_digest,
            reason_code = ReasonCode::ApplyOk.as_str(),
            "pack applied"
        );
        Ok(ApplyDecision::applied(&next))
    }
}

fn decision_time(now_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(now_ms)
}

/// The high-water mark never moves down and only ever holds a version the
/// rollback gate can order. An unreadable previous mark is replaced by a
/// readable incoming version.
fn next_max_seen(previous: Option<&str>, incoming: &str) -> Option<String> {
    let prev = previous.and_then(Semver::parse_pack_version);
    match (prev, Semver::parse_pack_version(incoming)) {
        (Some(p), Some(i)) if p >= i => previous.map(str::to_string),
        (_, Some(i)) => Some(i.to_string()),
        (_, None) => previous.map(str::to_string),
    }
}

/// The minimal apply contract: trust verdict, expiry, commit.
pub fn apply_model_pack_or_block(state_path: &Path, request: &ApplyRequest<'_>) -> Result<ApplyDecision> {
    Orchestrator::minimal(state_path).apply(request)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::CompatibilityRequirement;
    use crate::keys::KeyRecord;
    use crate::manifest::{ManifestEntry, MANIFEST_SCHEMA};
    use chrono::TimeZone;
    use tempfile::TempDir;

    const NOW: i64 = 1_800_000_000_000;

    fn manifest(pack_id: &str, version: &str) -> ModelPackManifest {
        ModelPackManifest {
            schema_name: MANIFEST_SCHEMA.to_string(),
            pack_id: pack_id.to_string(),
            version: version.to_string(),
            compat: Some(CompatibilityRequirement {
                min_runtime_semver: "2.0.0".to_string(),
                min_gateway_semver: "1.5.0".to_string(),
            }),
            created_at_utc: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            files: vec![ManifestEntry {
                path: "weights.bin".to_string(),
                sha256: Digest::of(version.as_bytes()),
            }],
        }
    }

    fn request(m: &ModelPackManifest, verification: Verification, expires_at_ms: i64) -> ApplyRequest<'_> {
        let mut req = ApplyRequest::for_manifest(m, verification, expires_at_ms, NOW).unwrap();
        req.key_id = Some("k1".to_string());
        req
    }

    fn node() -> NodeVersions {
        NodeVersions {
            runtime: "2.0.0".to_string(),
            gateway: "1.5.0".to_string(),
        }
    }

    fn registry() -> KeyRegistry {
        let mut reg = KeyRegistry::new();
        reg.upsert(KeyRecord::active("k1", vec![1; 32])).unwrap();
        reg
    }

    #[test]
    fn end_to_end_apply_then_rejected_apply_leaves_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("accounting", "1.0.0");

        let decision =
            apply_model_pack_or_block(&path, &request(&m, Verification::Verified, NOW + 1000)).unwrap();
        assert!(decision.applied);
        assert_eq!(decision.reason_code, ReasonCode::ApplyOk);
        assert_eq!(decision.active_pack_id.as_deref(), Some("accounting"));

        let persisted = store::read(&path).unwrap();
        assert_eq!(persisted.active_pack_id.as_deref(), Some("accounting"));
        assert_eq!(persisted.active_manifest_digest, Some(m.fingerprint().unwrap()));
        assert_eq!(persisted.updated_at.timestamp_millis(), NOW);
        let before = std::fs::read(&path).unwrap();

        let other = manifest("other", "2.0.0");
        let rejected = Verification::Rejected(ReasonCode::SignatureInvalid);
        let decision = apply_model_pack_or_block(&path, &request(&other, rejected, NOW + 1000)).unwrap();
        assert!(!decision.applied);
        assert_eq!(decision.reason_code, ReasonCode::SignatureInvalid);
        assert_eq!(decision.active_pack_id.as_deref(), Some("accounting"));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn expiry_rules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");

        let d = apply_model_pack_or_block(&path, &request(&m, Verification::Verified, 0)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::ExpiresAtInvalid);
        let d = apply_model_pack_or_block(&path, &request(&m, Verification::Verified, NOW - 1)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::ExpiredBlocked);
        assert!(!path.exists());

        // Expiring exactly now is still honored by the minimal chain.
        let d = apply_model_pack_or_block(&path, &request(&m, Verification::Verified, NOW)).unwrap();
        assert!(d.applied);
    }

    #[test]
    fn trust_is_checked_before_expiry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");
        let rejected = Verification::Rejected(ReasonCode::KeyRevoked);
        let d = apply_model_pack_or_block(&path, &request(&m, rejected, -5)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::KeyRevoked);
    }

    #[test]
    fn standard_chain_order() {
        let reg = registry();
        let orch = Orchestrator::standard("s.json", &reg, node(), &Policy::default());
        assert_eq!(orch.gate_names(), ["trust", "key", "expiry", "compat", "rollback"]);

        let relaxed = Policy {
            enforce_compat: false,
            enforce_anti_rollback: false,
            ..Policy::default()
        };
        let orch = Orchestrator::standard("s.json", &reg, node(), &relaxed);
        assert_eq!(orch.gate_names(), ["trust", "key", "expiry"]);
    }

    #[test]
    fn key_gate_rechecks_registry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");
        let mut reg = registry();
        reg.revoke("k1").unwrap();
        let orch = Orchestrator::standard(&path, &reg, node(), &Policy::default());

        let d = orch.apply(&request(&m, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::KeyRevoked);

        let mut unsigned = request(&m, Verification::Verified, NOW + 1000);
        unsigned.key_id = None;
        let d = orch.apply(&unsigned).unwrap();
        assert_eq!(d.reason_code, ReasonCode::SignatureMissing);
        assert!(!path.exists());
    }

    #[test]
    fn compat_gate_blocks_old_runtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");
        let reg = registry();
        let old = NodeVersions {
            runtime: "1.9.9".to_string(),
            gateway: "1.5.0".to_string(),
        };
        let orch = Orchestrator::standard(&path, &reg, old, &Policy::default());
        let d = orch.apply(&request(&m, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::CompatRuntimeTooLow);

        let mut no_compat = manifest("p", "1.0.0");
        no_compat.compat = None;
        let orch = Orchestrator::standard(&path, &reg, node(), &Policy::default());
        let d = orch.apply(&request(&no_compat, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::CompatMissing);
    }

    #[test]
    fn rollback_is_refused_and_equal_version_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let reg = registry();
        let orch = Orchestrator::standard(&path, &reg, node(), &Policy::default());

        let v2 = manifest("p", "2.0.0");
        assert!(orch.apply(&request(&v2, Verification::Verified, NOW + 1000)).unwrap().applied);
        assert_eq!(store::read(&path).unwrap().max_seen_version.as_deref(), Some("2.0.0"));

        let v1 = manifest("p", "1.9.0");
        let d = orch.apply(&request(&v1, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::AntiRollbackDetected);
        assert_eq!(d.active_manifest_digest, Some(v2.fingerprint().unwrap()));

        assert!(orch.apply(&request(&v2, Verification::Verified, NOW + 1000)).unwrap().applied);

        let v3 = manifest("p", "2.1.0");
        assert!(orch.apply(&request(&v3, Verification::Verified, NOW + 1000)).unwrap().applied);
        assert_eq!(store::read(&path).unwrap().max_seen_version.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn max_seen_never_decreases_when_rollback_gate_is_off() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let reg = registry();
        let policy = Policy {
            enforce_anti_rollback: false,
            ..Policy::default()
        };
        let orch = Orchestrator::standard(&path, &reg, node(), &policy);

        let v2 = manifest("p", "2.0.0");
        let v1 = manifest("p", "1.0.0");
        assert!(orch.apply(&request(&v2, Verification::Verified, NOW + 1000)).unwrap().applied);
        assert!(orch.apply(&request(&v1, Verification::Verified, NOW + 1000)).unwrap().applied);
        let state = store::read(&path).unwrap();
        assert_eq!(state.active_manifest_digest, Some(v1.fingerprint().unwrap()));
        assert_eq!(state.max_seen_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn corrupt_high_water_mark_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let stored = RolloutState {
            max_seen_version: Some("two".to_string()),
            ..RolloutState::default()
        };
        store::write_atomic_durable(&path, &stored).unwrap();
        let reg = registry();
        let orch = Orchestrator::standard(&path, &reg, node(), &Policy::default());
        let m = manifest("p", "1.0.0");
        let d = orch.apply(&request(&m, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::AntiRollbackInvalidMaxSeen);
    }

    #[test]
    fn anti_freeze_catches_expiry_at_now() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let reg = registry();
        let orch = Orchestrator::standard(&path, &reg, node(), &Policy::default());
        let m = manifest("p", "1.0.0");
        let d = orch.apply(&request(&m, Verification::Verified, NOW)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::AntiFreezeExpired);
    }

    struct DenyPack(&'static str);

    impl Gate for DenyPack {
        fn name(&self) -> &'static str {
            "deny"
        }

        fn check(&self, request: &ApplyRequest<'_>, _: &RolloutState) -> std::result::Result<(), ReasonCode> {
            if request.pack_id == self.0 {
                Err(ReasonCode::ApplyBlocked)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn custom_gate_runs_last() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let orch = Orchestrator::minimal(&path).with_gate(DenyPack("blocked_pack"));
        assert_eq!(orch.gate_names(), ["trust", "expiry", "deny"]);

        let m = manifest("blocked_pack", "1.0.0");
        let d = orch.apply(&request(&m, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::ApplyBlocked);
        let ok = manifest("fine_pack", "1.0.0");
        assert!(orch.apply(&request(&ok, Verification::Verified, NOW + 1000)).unwrap().applied);
    }

    #[test]
    fn persistence_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();
        let path = blocker.join("state.json");
        let m = manifest("p", "1.0.0");
        assert!(apply_model_pack_or_block(&path, &request(&m, Verification::Verified, NOW + 1000)).is_err());
    }

    #[test]
    fn decision_wire_format() {
        let d = ApplyDecision::blocked(ReasonCode::ExpiredBlocked, &RolloutState::default());
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["applied"], false);
        assert_eq!(json["reason_code"], "EXPIRED_BLOCKED");
        assert!(json["active_pack_id"].is_null());
    }

    #[test]
    fn next_max_seen_is_monotone() {
        assert_eq!(next_max_seen(None, "1.0.0").as_deref(), Some("1.0.0"));
        assert_eq!(next_max_seen(Some("2.0.0"), "1.0.0").as_deref(), Some("2.0.0"));
        assert_eq!(next_max_seen(Some("2.0.0"), "2.0.1").as_deref(), Some("2.0.1"));
        assert_eq!(next_max_seen(Some("bad"), "1.0.0").as_deref(), Some("1.0.0"));
        assert_eq!(next_max_seen(Some("2.0.0"), "bad").as_deref(), Some("2.0.0"));
        assert_eq!(next_max_seen(Some("2.0.0"), "1.2000000.0").as_deref(), Some("2.0.0"));
        assert_eq!(next_max_seen(None, "1.2000000.0"), None);
    }

    #[test]
    fn unorderable_version_never_poisons_the_high_water_mark() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let reg = registry();
        let huge = manifest("p", "1.2000000.0");

        let guarded = Orchestrator::standard(&path, &reg, node(), &Policy::default());
        let d = guarded.apply(&request(&huge, Verification::Verified, NOW + 1000)).unwrap();
        assert_eq!(d.reason_code, ReasonCode::AntiRollbackInvalidIncoming);
        assert!(!path.exists());

        let relaxed = Policy {
            enforce_anti_rollback: false,
            ..Policy::default()
        };
        let unguarded = Orchestrator::standard(&path, &reg, node(), &relaxed);
        assert!(unguarded.apply(&request(&huge, Verification::Verified, NOW + 1000)).unwrap().applied);
        assert_eq!(store::read(&path).unwrap().max_seen_version, None);

        let v2 = manifest("p", "2.0.0");
        let d = guarded.apply(&request(&v2, Verification::Verified, NOW + 1000)).unwrap();
        assert!(d.applied, "{:?}", d.reason_code);
        assert_eq!(store::read(&path).unwrap().max_seen_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn unrepresentable_now_blocks_instead_of_using_wall_clock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");
        let mut req = request(&m, Verification::Verified, i64::MAX);
        req.now_ms = i64::MAX;

        let d = apply_model_pack_or_block(&path, &req).unwrap();
        assert!(!d.applied);
        assert_eq!(d.reason_code, ReasonCode::ExpiresAtInvalid);
        assert!(!path.exists());
    }

    #[test]
    fn updated_at_is_the_callers_now() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let m = manifest("p", "1.0.0");
        let mut req = request(&m, Verification::Verified, NOW + 10_000);
        req.now_ms = NOW + 5;
        assert!(apply_model_pack_or_block(&path, &req).unwrap().applied);
        assert_eq!(store::read(&path).unwrap().updated_at.timestamp_millis(), NOW + 5);
    }
}
