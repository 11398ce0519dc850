use crate::output::print_json;
use anyhow::Context;
use packtrust_core::{
    config::Config,
    keys::KeyRegistry,
    reason::ReasonCode,
    signature::{self, Ed25519Verifier, VerifiedPack},
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct VerifyOutput<'a> {
    verified: bool,
    reason_code: Option<ReasonCode>,
    pack_id: Option<&'a str>,
    version: Option<&'a str>,
    key_id: Option<&'a str>,
    manifest_digest: Option<String>,
}

pub fn run(root: &Path, pack_dir: &Path, now_ms: Option<i64>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let registry = KeyRegistry::load(&config.keyring_path(root)).context("failed to load key ring")?;
    let verified = signature::verify_pack(pack_dir, &registry, &Ed25519Verifier, super::now_ms(now_ms))
        .with_context(|| format!("failed to verify {}", pack_dir.display()))?;

    print_verdict(&verified, json)?;
    if let Some(code) = verified.verification.reason_code() {
        anyhow::bail!("pack rejected: {}", code.as_str());
    }
    Ok(())
}

fn print_verdict(verified: &VerifiedPack, json: bool) -> anyhow::Result<()> {
    let out = VerifyOutput {
        verified: verified.verification.is_verified(),
        reason_code: verified.verification.reason_code(),
        pack_id: verified.manifest.as_ref().map(|m| m.pack_id.as_str()),
        version: verified.manifest.as_ref().map(|m| m.version.as_str()),
        key_id: verified.key_id.as_deref(),
        manifest_digest: verified.manifest_digest.map(|d| d.to_hex()),
    };
    if json {
        return print_json(&out);
    }
    match out.reason_code {
        None => println!("VERIFIED"),
        Some(code) => println!("REJECTED {}", code.as_str()),
    }
    if let (Some(id), Some(v)) = (out.pack_id, out.version) {
        println!("pack:            {id} {v}");
    }
    if let Some(k) = out.key_id {
        println!("key_id:          {k}");
    }
    if let Some(d) = &out.manifest_digest {
        println!("manifest_digest: {d}");
    }
    Ok(())
}
