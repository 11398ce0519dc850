use crate::output::print_json;
use anyhow::Context;
use packtrust_core::{config::Config, store};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let state = store::read(&config.state_path(root)).context("failed to read rollout state")?;

    if json {
        return print_json(&state);
    }
    println!("Node: {}", config.node.name);
    println!(
        "active_pack_id:         {}",
        state.active_pack_id.as_deref().unwrap_or("-")
    );
    println!(
        "active_manifest_digest: {}",
        state
            .active_manifest_digest
            .map(|d| d.to_hex())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "max_seen_version:       {}",
        state.max_seen_version.as_deref().unwrap_or("-")
    );
    println!("updated_at:             {}", state.updated_at.to_rfc3339());
    Ok(())
}
