use crate::output::print_json;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use packtrust_core::manifest;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ManifestSubcommand {
    /// Hash the pack files and write manifest.json
    Build {
        pack_dir: PathBuf,
        /// Creation time to record, RFC 3339 (default: now)
        #[arg(long)]
        created_at: Option<String>,
    },

    /// Print the fingerprint of the existing manifest.json
    Digest { pack_dir: PathBuf },
}

pub fn run(subcmd: ManifestSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ManifestSubcommand::Build {
            pack_dir,
            created_at,
        } => build(&pack_dir, created_at.as_deref(), json),
        ManifestSubcommand::Digest { pack_dir } => digest(&pack_dir, json),
    }
}

fn build(pack_dir: &Path, created_at: Option<&str>, json: bool) -> anyhow::Result<()> {
    let created_at = match created_at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --created-at '{s}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let m = manifest::build_manifest(pack_dir, created_at)
        .with_context(|| format!("failed to build manifest for {}", pack_dir.display()))?;
    manifest::write_manifest(pack_dir, &m).context("failed to write manifest.json")?;
    let fingerprint = m.fingerprint()?;

    if json {
        print_json(&serde_json::json!({
            "pack_id": m.pack_id,
            "version": m.version,
            "files": m.files.len(),
            "manifest_digest": fingerprint,
        }))?;
    } else {
        println!(
            "Built manifest for {} {} ({} files)",
            m.pack_id,
            m.version,
            m.files.len()
        );
        println!("manifest_digest: {fingerprint}");
    }
    Ok(())
}

fn digest(pack_dir: &Path, json: bool) -> anyhow::Result<()> {
    let m = manifest::load_manifest(pack_dir).context("failed to load manifest")?;
    let fingerprint = m.fingerprint()?;
    if json {
        print_json(&serde_json::json!({
            "pack_id": m.pack_id,
            "version": m.version,
            "manifest_digest": fingerprint,
        }))?;
    } else {
        println!("{fingerprint}");
    }
    Ok(())
}
