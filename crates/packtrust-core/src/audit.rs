use crate::apply::ApplyDecision;
use crate::canon::{self, Value};
use crate::digest::Digest;
use crate::error::Result;
use crate::reason::ReasonCode;
use serde::Serialize;
use std::path::Path;

pub const APPLY_EVENT: &str = "MODEL_PACK_APPLY";

/// One apply attempt, reduced to identifiers and digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts_ms: i64,
    pub applied: bool,
    pub reason_code: ReasonCode,
    pub pack_id: Option<String>,
    pub manifest_digest: Option<Digest>,
}

impl AuditEvent {
    /// `pack_id` and `manifest_digest` describe the pack that was offered,
    /// not the pointer that ended up active.
    pub fn apply(
        decision: &ApplyDecision,
        pack_id: Option<&str>,
        manifest_digest: Option<Digest>,
        ts_ms: i64,
    ) -> Self {
        Self {
            event: APPLY_EVENT,
            ts_ms,
            applied: decision.applied,
            reason_code: decision.reason_code,
            pack_id: pack_id.map(str::to_string),
            manifest_digest,
        }
    }

    /// Flat canonical form: a single object, no arrays, sorted keys.
    pub fn to_line(&self) -> Result<String> {
        let opt = |s: Option<String>| s.map(Value::String).unwrap_or(Value::Null);
        let value = Value::object([
            ("event", Value::string(self.event)),
            ("ts_ms", Value::Number(self.ts_ms as f64)),
            ("applied", Value::Bool(self.applied)),
            ("reason_code", Value::string(self.reason_code.as_str())),
            ("pack_id", opt(self.pack_id.clone())),
            ("manifest_digest", opt(self.manifest_digest.map(|d| d.to_hex()))),
        ]);
        let bytes = canon::canonicalize_flat(&value)?;
        let mut line = String::from_utf8_lossy(&bytes).into_owned();
        line.push('\n');
        Ok(line)
    }

    pub fn append(&self, path: &Path) -> Result<()> {
        crate::io::append_text(path, &self.to_line()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
