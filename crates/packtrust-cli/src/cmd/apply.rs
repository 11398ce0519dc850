use crate::output::print_json;
use anyhow::Context;
use packtrust_core::{
    apply::{ApplyDecision, ApplyRequest, Orchestrator},
    audit::AuditEvent,
    config::Config,
    keys::KeyRegistry,
    reason::ReasonCode,
    signature::{self, Ed25519Verifier},
    store,
};
use std::path::Path;
use tracing::warn;

pub fn run(
    root: &Path,
    pack_dir: &Path,
    expires_at_ms: Option<i64>,
    now_ms: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = KeyRegistry::load(&config.keyring_path(root)).context("failed to load key ring")?;
    let state_path = config.state_path(root);

    let now_ms = super::now_ms(now_ms);
    // Expiry is authorization metadata; the node never grants its own.
    let expires_at_ms = expires_at_ms.unwrap_or(0);

    let verified = signature::verify_pack(pack_dir, &registry, &Ed25519Verifier, now_ms)
        .with_context(|| format!("failed to verify {}", pack_dir.display()))?;

    let decision = match ApplyRequest::from_verified(&verified, expires_at_ms, now_ms) {
        Some(request) => {
            Orchestrator::standard(&state_path, &registry, config.node_versions(), &config.policy)
                .apply(&request)
                .context("failed to persist rollout state")?
        }
        None => {
            // Verification stopped before a manifest existed to gate on.
            let code = verified
                .verification
                .reason_code()
                .unwrap_or(ReasonCode::ReasonCodeUnknownBlocked);
            let current = store::read(&state_path).context("failed to read rollout state")?;
            ApplyDecision::blocked(code, &current)
        }
    };

    let event = AuditEvent::apply(
        &decision,
        verified.manifest.as_ref().map(|m| m.pack_id.as_str()),
        verified.manifest_digest,
        now_ms,
    );
    if let Err(e) = event.append(&config.audit_path(root)) {
        warn!(error = %e, "audit event write failed");
    }

    if json {
        print_json(&decision)?;
    } else {
        let status = if decision.applied { "APPLIED" } else { "BLOCKED" };
        println!("{status} {}", decision.reason_code.as_str());
        println!(
            "active_pack_id:         {}",
            decision.active_pack_id.as_deref().unwrap_or("-")
        );
        println!(
            "active_manifest_digest: {}",
            decision
                .active_manifest_digest
                .map(|d| d.to_hex())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    if !decision.applied {
        anyhow::bail!("apply blocked: {}", decision.reason_code.as_str());
    }
    Ok(())
}
