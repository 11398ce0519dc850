use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use packtrust_core::signature::{self, Ed25519Signer, Ed25519Verifier};
use std::path::Path;

pub const SIGNING_KEY_ENV: &str = "PACKTRUST_SIGNING_KEY_B64";

pub fn run(pack_dir: &Path, key_id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let seed = std::env::var(SIGNING_KEY_ENV)
        .with_context(|| format!("{SIGNING_KEY_ENV} is not set"))?;
    let signer = Ed25519Signer::from_seed_b64(&seed)?;
    let file = signature::sign_pack(pack_dir, &signer, &Ed25519Verifier, key_id, Utc::now())
        .with_context(|| format!("failed to sign {}", pack_dir.display()))?;

    if json {
        print_json(&file)?;
    } else {
        println!("Signed {} with key '{}'", pack_dir.display(), file.key_id);
        println!("public_key_b64: {}", file.public_key_b64);
    }
    Ok(())
}
