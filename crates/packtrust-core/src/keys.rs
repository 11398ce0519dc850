use crate::error::{PackError, Result};
use crate::reason::ReasonCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// KeyState / KeyRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Active,
    Grace,
    Revoked,
}

impl KeyState {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyState::Active => "active",
            KeyState::Grace => "grace",
            KeyState::Revoked => "revoked",
        }
    }
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KeyState {
    type Err = PackError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(KeyState::Active),
            "grace" => Ok(KeyState::Grace),
            "revoked" => Ok(KeyState::Revoked),
            _ => Err(PackError::KeyringInvalid(format!("unknown key state '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_id: String,
    #[serde(rename = "public_key_b64", with = "crate::signature::b64")]
    pub public_key: Vec<u8>,
    pub state: KeyState,
    /// Only meaningful while `state == Grace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_until_ms: Option<i64>,
}

impl KeyRecord {
    pub fn active(key_id: impl Into<String>, public_key: Vec<u8>) -> Self {
        Self {
            key_id: key_id.into(),
            public_key,
            state: KeyState::Active,
            grace_until_ms: None,
        }
    }

    pub fn grace(key_id: impl Into<String>, public_key: Vec<u8>, grace_until_ms: i64) -> Self {
        Self {
            key_id: key_id.into(),
            public_key,
            state: KeyState::Grace,
            grace_until_ms: Some(grace_until_ms),
        }
    }

    pub fn revoked(key_id: impl Into<String>, public_key: Vec<u8>) -> Self {
        Self {
            key_id: key_id.into(),
            public_key,
            state: KeyState::Revoked,
            grace_until_ms: None,
        }
    }
}

// ---------------------------------------------------------------------------
// KeyRegistry
// ---------------------------------------------------------------------------

/// Sole owner of every signing key a verifier knows about.
///
/// Lifecycle per key: `active -> grace -> revoked`; `revoked` is terminal.
/// Callers query through [`KeyRegistry::can_verify_with`] and mutate only
/// through the rotation / revocation operations below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRegistry {
    records: BTreeMap<String, KeyRecord>,
}

#[derive(Serialize, Deserialize)]
struct KeyringFile {
    #[serde(default)]
    keys: Vec<KeyRecord>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by `key_id`. A revoked record can never be replaced.
    pub fn upsert(&mut self, record: KeyRecord) -> Result<()> {
        if let Some(existing) = self.records.get(&record.key_id) {
            if existing.state == KeyState::Revoked {
                return Err(PackError::KeyRevokedTerminal(record.key_id));
            }
        }
        self.records.insert(record.key_id.clone(), record);
        Ok(())
    }

    pub fn get(&self, key_id: &str) -> Option<&KeyRecord> {
        self.records.get(key_id)
    }

    pub fn list(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The single decision point for "may a signature by this key be trusted
    /// at `now_ms`". Revocation has no time-based exception.
    pub fn can_verify_with(&self, key_id: &str, now_ms: i64) -> std::result::Result<&KeyRecord, ReasonCode> {
        let record = self.records.get(key_id).ok_or(ReasonCode::KeyUnknown)?;
        match record.state {
            KeyState::Revoked => Err(ReasonCode::KeyRevoked),
            KeyState::Active => Ok(record),
            KeyState::Grace => match record.grace_until_ms {
                Some(until) if now_ms <= until => Ok(record),
                _ => Err(ReasonCode::KeyGraceExpired),
            },
        }
    }

    /// Introduce `new_key` as the active key. Every currently active key
    /// moves to `grace` until `grace_until_ms` so in-flight signatures keep
    /// verifying during the overlap window.
    pub fn rotate(&mut self, new_key: KeyRecord, grace_until_ms: i64) -> Result<Vec<String>> {
        if let Some(existing) = self.records.get(&new_key.key_id) {
            if existing.state == KeyState::Revoked {
                return Err(PackError::KeyRevokedTerminal(new_key.key_id));
            }
        }
        let mut demoted = Vec::new();
        for record in self.records.values_mut() {
            if record.state == KeyState::Active && record.key_id != new_key.key_id {
                record.state = KeyState::Grace;
                record.grace_until_ms = Some(grace_until_ms);
                demoted.push(record.key_id.clone());
            }
        }
        info!(key_id = %new_key.key_id, demoted = demoted.len(), "key rotated");
        let new_key = KeyRecord {
            state: KeyState::Active,
            grace_until_ms: None,
            ..new_key
        };
        self.records.insert(new_key.key_id.clone(), new_key);
        Ok(demoted)
    }

    /// Explicit operator revocation. Idempotent for already revoked keys.
    pub fn revoke(&mut self, key_id: &str) -> Result<()> {
        let record = self
            .records
            .get_mut(key_id)
            .ok_or_else(|| PackError::KeyNotFound(key_id.to_string()))?;
        record.state = KeyState::Revoked;
        record.grace_until_ms = None;
        warn!(key_id = %key_id, "key revoked");
        Ok(())
    }

    /// Revoke every grace key whose window has lapsed. Returns their ids.
    pub fn sweep_expired_grace(&mut self, now_ms: i64) -> Vec<String> {
        let mut revoked = Vec::new();
        for record in self.records.values_mut() {
            let lapsed = match record.grace_until_ms {
                Some(until) => now_ms > until,
                None => true,
            };
            if record.state == KeyState::Grace && lapsed {
                record.state = KeyState::Revoked;
                record.grace_until_ms = None;
                revoked.push(record.key_id.clone());
            }
        }
        if !revoked.is_empty() {
            info!(count = revoked.len(), "grace keys revoked after window lapsed");
        }
        revoked
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// A missing key ring is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let file: KeyringFile = serde_json::from_str(&data)?;
        let mut registry = Self::new();
        for record in file.keys {
            if registry.records.contains_key(&record.key_id) {
                return Err(PackError::KeyringInvalid(format!(
                    "duplicate key_id '{}'",
                    record.key_id
                )));
            }
            registry.records.insert(record.key_id.clone(), record);
        }
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = KeyringFile {
            keys: self.records.values().cloned().collect(),
        };
        let mut data = serde_json::to_string_pretty(&file)?;
        data.push('\n');
        crate::io::write_atomic_durable(path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000_000;

    fn pk(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    #[test]
    fn unknown_key_is_rejected() {
        let registry = KeyRegistry::new();
        assert_eq!(
            registry.can_verify_with("nope", NOW).unwrap_err(),
            ReasonCode::KeyUnknown
        );
    }

    #[test]
    fn multi_key_verify_during_grace() {
        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::grace("k_old", pk(1), NOW + 60_000)).unwrap();
        registry.upsert(KeyRecord::active("k_new", pk(2))).unwrap();

        assert!(registry.can_verify_with("k_new", NOW).is_ok());
        assert!(registry.can_verify_with("k_old", NOW).is_ok());
        // boundary is inclusive
        assert!(registry.can_verify_with("k_old", NOW + 60_000).is_ok());
        assert_eq!(
            registry.can_verify_with("k_old", NOW + 60_001).unwrap_err(),
            ReasonCode::KeyGraceExpired
        );
    }

    #[test]
    fn grace_without_deadline_fails_closed() {
        let mut registry = KeyRegistry::new();
        let mut rec = KeyRecord::grace("k", pk(1), 0);
        rec.grace_until_ms = None;
        registry.upsert(rec).unwrap();
        assert_eq!(
            registry.can_verify_with("k", NOW).unwrap_err(),
            ReasonCode::KeyGraceExpired
        );
    }

    #[test]
    fn revoked_key_is_blocked_at_every_instant() {
        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::revoked("k_rev", pk(3))).unwrap();
        for now in [0, 1, NOW, i64::MAX] {
            assert_eq!(
                registry.can_verify_with("k_rev", now).unwrap_err(),
                ReasonCode::KeyRevoked
            );
        }
    }

    #[test]
    fn revoked_is_terminal() {
        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::active("k", pk(1))).unwrap();
        registry.revoke("k").unwrap();
        assert!(matches!(
            registry.upsert(KeyRecord::active("k", pk(1))),
            Err(PackError::KeyRevokedTerminal(_))
        ));
        assert!(matches!(
            registry.rotate(KeyRecord::active("k", pk(1)), NOW),
            Err(PackError::KeyRevokedTerminal(_))
        ));
        assert_eq!(registry.get("k").unwrap().state, KeyState::Revoked);
    }

    #[test]
    fn revoke_unknown_key_errors() {
        let mut registry = KeyRegistry::new();
        assert!(matches!(registry.revoke("ghost"), Err(PackError::KeyNotFound(_))));
    }

    #[test]
    fn rotation_demotes_active_keys_to_grace() {
        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::active("k1", pk(1))).unwrap();
        let demoted = registry
            .rotate(KeyRecord::active("k2", pk(2)), NOW + 1_000)
            .unwrap();
        assert_eq!(demoted, vec!["k1".to_string()]);

        let k1 = registry.get("k1").unwrap();
        assert_eq!(k1.state, KeyState::Grace);
        assert_eq!(k1.grace_until_ms, Some(NOW + 1_000));
        assert_eq!(registry.get("k2").unwrap().state, KeyState::Active);

        assert!(registry.can_verify_with("k1", NOW).is_ok());
        assert!(registry.can_verify_with("k2", NOW).is_ok());
    }

    #[test]
    fn sweep_revokes_lapsed_grace_keys() {
        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::grace("old", pk(1), NOW)).unwrap();
        registry.upsert(KeyRecord::grace("fresh", pk(2), NOW + 10)).unwrap();
        registry.upsert(KeyRecord::active("cur", pk(3))).unwrap();

        assert!(registry.sweep_expired_grace(NOW).is_empty());
        assert_eq!(registry.sweep_expired_grace(NOW + 1), vec!["old".to_string()]);
        assert_eq!(registry.get("old").unwrap().state, KeyState::Revoked);
        assert_eq!(registry.get("fresh").unwrap().state, KeyState::Grace);
        assert_eq!(registry.get("cur").unwrap().state, KeyState::Active);
    }

    #[test]
    fn keyring_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".packtrust/keys.json");

        let mut registry = KeyRegistry::new();
        registry.upsert(KeyRecord::active("k2", pk(2))).unwrap();
        registry.upsert(KeyRecord::grace("k1", pk(1), NOW)).unwrap();
        registry.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"public_key_b64\""));
        assert!(raw.contains("\"grace\""));

        let loaded = KeyRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_keyring_is_empty() {
        let dir = TempDir::new().unwrap();
        let registry = KeyRegistry::load(&dir.path().join("keys.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_ids_in_keyring_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys.json");
        let rec = r#"{"key_id":"k","public_key_b64":"AAAA","state":"active"}"#;
        std::fs::write(&path, format!("{{\"keys\":[{rec},{rec}]}}")).unwrap();
        assert!(matches!(
            KeyRegistry::load(&path),
            Err(PackError::KeyringInvalid(_))
        ));
    }
}
