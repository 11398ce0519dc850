use packtrust_core::paths::PACKTRUST_DIR;
use std::path::{Path, PathBuf};

/// Resolve the node root directory.
///
/// Priority:
/// 1. `--root` flag / `PACKTRUST_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.packtrust/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, PACKTRUST_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
