use crate::output::print_json;
use anyhow::Context;
use clap::ValueEnum;
use packtrust_core::{
    canon::{self, Value},
    digest::Digest,
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CanonMode {
    /// Any root, arrays keep producer order
    General,
    /// Object root, arrays rejected
    Flat,
    /// Object or array root, primitive arrays sorted
    Nested,
}

pub fn run(file: &Path, mode: CanonMode, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: serde_json::Value =
        serde_json::from_str(&data).with_context(|| format!("{} is not JSON", file.display()))?;
    let value = Value::from(parsed);

    let bytes = match mode {
        CanonMode::General => canon::canonicalize(&value),
        CanonMode::Flat => canon::canonicalize_flat(&value),
        CanonMode::Nested => canon::canonicalize_nested(&value),
    }
    .context("canonicalization failed")?;
    let text = String::from_utf8(bytes).context("canonical output is not UTF-8")?;

    if json {
        print_json(&serde_json::json!({
            "canonical": text,
            "sha256": Digest::of(text.as_bytes()),
        }))?;
    } else {
        println!("{text}");
    }
    Ok(())
}
