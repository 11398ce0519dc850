use crate::output::{print_json, print_table};
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Subcommand;
use packtrust_core::{
    config::Config,
    keys::{KeyRecord, KeyRegistry},
    paths,
};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum KeysSubcommand {
    /// Add a key as active, or as grace when --grace-until-ms is given
    Add {
        #[arg(long)]
        key_id: String,
        /// Ed25519 public key, standard base64
        #[arg(long)]
        public_key_b64: String,
        #[arg(long)]
        grace_until_ms: Option<i64>,
    },

    /// Introduce a new active key; current active keys enter grace
    Rotate {
        #[arg(long)]
        key_id: String,
        #[arg(long)]
        public_key_b64: String,
        /// Length of the overlap window in ms
        #[arg(long)]
        grace_ms: i64,
    },

    /// Revoke a key immediately
    Revoke { key_id: String },

    /// Revoke grace keys whose window has passed
    Sweep {
        #[arg(long)]
        now_ms: Option<i64>,
    },

    /// List keys
    List,

    /// Check whether a key may verify signatures now
    Check {
        key_id: String,
        #[arg(long)]
        now_ms: Option<i64>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: KeysSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let path = config.keyring_path(root);
    let mut registry = KeyRegistry::load(&path).context("failed to load key ring")?;

    match subcmd {
        KeysSubcommand::Add {
            key_id,
            public_key_b64,
            grace_until_ms,
        } => add(&mut registry, &path, &key_id, &public_key_b64, grace_until_ms),
        KeysSubcommand::Rotate {
            key_id,
            public_key_b64,
            grace_ms,
        } => rotate(&mut registry, &path, &key_id, &public_key_b64, grace_ms, json),
        KeysSubcommand::Revoke { key_id } => {
            registry.revoke(&key_id)?;
            save(&registry, &path)?;
            println!("Revoked key '{key_id}'.");
            Ok(())
        }
        KeysSubcommand::Sweep { now_ms } => sweep(&mut registry, &path, super::now_ms(now_ms), json),
        KeysSubcommand::List => list(&registry, json),
        KeysSubcommand::Check { key_id, now_ms } => check(&registry, &key_id, super::now_ms(now_ms), json),
    }
}

fn save(registry: &KeyRegistry, path: &Path) -> anyhow::Result<()> {
    registry.save(path).context("failed to save key ring")
}

fn decode_public_key(key_id: &str, encoded: &str) -> anyhow::Result<Vec<u8>> {
    paths::validate_id(key_id)?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .context("--public-key-b64 is not valid base64")?;
    if bytes.len() != 32 {
        anyhow::bail!("public key must decode to 32 bytes (got {})", bytes.len());
    }
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// add / rotate
// ---------------------------------------------------------------------------

fn add(
    registry: &mut KeyRegistry,
    path: &Path,
    key_id: &str,
    public_key_b64: &str,
    grace_until_ms: Option<i64>,
) -> anyhow::Result<()> {
    let public_key = decode_public_key(key_id, public_key_b64)?;
    let record = match grace_until_ms {
        Some(until) => KeyRecord::grace(key_id, public_key, until),
        None => KeyRecord::active(key_id, public_key),
    };
    let state = record.state;
    registry.upsert(record)?;
    save(registry, path)?;
    println!("Added key '{key_id}' ({state}).");
    Ok(())
}

fn rotate(
    registry: &mut KeyRegistry,
    path: &Path,
    key_id: &str,
    public_key_b64: &str,
    grace_ms: i64,
    json: bool,
) -> anyhow::Result<()> {
    if grace_ms < 0 {
        anyhow::bail!("--grace-ms must not be negative");
    }
    let public_key = decode_public_key(key_id, public_key_b64)?;
    let grace_until_ms = super::now_ms(None).saturating_add(grace_ms);
    let demoted = registry.rotate(KeyRecord::active(key_id, public_key), grace_until_ms)?;
    save(registry, path)?;

    if json {
        print_json(&serde_json::json!({
            "active": key_id,
            "grace": demoted,
            "grace_until_ms": grace_until_ms,
        }))?;
    } else {
        println!("Active key is now '{key_id}'.");
        for id in &demoted {
            println!("  grace until {grace_until_ms}: {id}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// sweep / list / check
// ---------------------------------------------------------------------------

fn sweep(registry: &mut KeyRegistry, path: &Path, now_ms: i64, json: bool) -> anyhow::Result<()> {
    let revoked = registry.sweep_expired_grace(now_ms);
    if !revoked.is_empty() {
        save(registry, path)?;
    }
    if json {
        print_json(&serde_json::json!({ "revoked": revoked }))?;
    } else if revoked.is_empty() {
        println!("No expired grace keys.");
    } else {
        for id in &revoked {
            println!("revoked: {id}");
        }
    }
    Ok(())
}

fn list(registry: &KeyRegistry, json: bool) -> anyhow::Result<()> {
    if json {
        let keys: Vec<&KeyRecord> = registry.list().collect();
        return print_json(&keys);
    }
    if registry.is_empty() {
        println!("No keys.");
        return Ok(());
    }
    let rows = registry
        .list()
        .map(|k| {
            vec![
                k.key_id.clone(),
                k.state.to_string(),
                k.grace_until_ms.map(|t| t.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["KEY_ID", "STATE", "GRACE_UNTIL_MS"], rows);
    Ok(())
}

fn check(registry: &KeyRegistry, key_id: &str, now_ms: i64, json: bool) -> anyhow::Result<()> {
    let reason = registry.can_verify_with(key_id, now_ms).err();
    if json {
        print_json(&serde_json::json!({
            "key_id": key_id,
            "ok": reason.is_none(),
            "reason_code": reason,
        }))?;
    } else {
        match reason {
            None => println!("ok: '{key_id}' may verify signatures"),
            Some(code) => println!("blocked: {}", code.as_str()),
        }
    }
    if let Some(code) = reason {
        anyhow::bail!("key '{key_id}' cannot verify: {}", code.as_str());
    }
    Ok(())
}
