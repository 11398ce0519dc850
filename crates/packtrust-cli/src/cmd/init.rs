use anyhow::Context;
use packtrust_core::{config::Config, paths, semver::Semver};
use std::path::Path;

pub fn run(
    root: &Path,
    node: Option<&str>,
    runtime_version: Option<&str>,
    gateway_version: Option<&str>,
) -> anyhow::Result<()> {
    for (flag, value) in [
        ("--runtime-version", runtime_version),
        ("--gateway-version", gateway_version),
    ] {
        if let Some(v) = value {
            if Semver::parse_strict(v).is_none() {
                anyhow::bail!("{flag} '{v}' is not a strict MAJOR.MINOR.PATCH version");
            }
        }
    }

    println!("Initializing packtrust in: {}", root.display());

    let dir = paths::packtrust_dir(root);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        return Ok(());
    }

    let node_name = node.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "node".to_string())
    });
    let mut cfg = Config::new(node_name);
    if let Some(v) = runtime_version {
        cfg.node.runtime_version = v.trim().to_string();
    }
    if let Some(v) = gateway_version {
        cfg.node.gateway_version = v.trim().to_string();
    }
    cfg.save(root).context("failed to write config.yaml")?;
    println!("  created: {}", paths::CONFIG_FILE);
    Ok(())
}
