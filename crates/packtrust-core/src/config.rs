use crate::compat::NodeVersions;
use crate::error::{PackError, Result};
use crate::paths;
use crate::semver::Semver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default = "default_node_version")]
    pub runtime_version: String,
    #[serde(default = "default_node_version")]
    pub gateway_version: String,
}

fn default_node_version() -> String {
    "0.0.0".to_string()
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

/// Relative entries resolve against the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_state")]
    pub state: String,
    #[serde(default = "default_keyring")]
    pub keyring: String,
    #[serde(default = "default_audit")]
    pub audit: String,
}

fn default_state() -> String {
    paths::DEFAULT_STATE_FILE.to_string()
}

fn default_keyring() -> String {
    paths::DEFAULT_KEYRING_FILE.to_string()
}

fn default_audit() -> String {
    paths::DEFAULT_AUDIT_FILE.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state(),
            keyring: default_keyring(),
            audit: default_audit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_true")]
    pub enforce_compat: bool,
    #[serde(default = "default_true")]
    pub enforce_anti_rollback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enforce_compat: true,
            enforce_anti_rollback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub node: NodeConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub policy: Policy,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            node: NodeConfig {
                name: node_name.into(),
                runtime_version: default_node_version(),
                gateway_version: default_node_version(),
            },
            paths: PathsConfig::default(),
            policy: Policy::default(),
        }
    }

    pub fn node_versions(&self) -> NodeVersions {
        NodeVersions {
            runtime: self.node.runtime_version.clone(),
            gateway: self.node.gateway_version.clone(),
        }
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.state)
    }

    pub fn keyring_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.keyring)
    }

    pub fn audit_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.audit)
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(PackError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::write_atomic_durable(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (field, value) in [
            ("node.runtime_version", &self.node.runtime_version),
            ("node.gateway_version", &self.node.gateway_version),
        ] {
            if Semver::parse_strict(value).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{field} '{value}' is not a strict MAJOR.MINOR.PATCH version"),
                });
            }
        }

        if !self.policy.enforce_compat {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "policy.enforce_compat is off: packs are applied without a compatibility check"
                    .to_string(),
            });
        }
        if !self.policy.enforce_anti_rollback {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "policy.enforce_anti_rollback is off: older pack versions can be re-applied"
                    .to_string(),
            });
        }

        if self.node.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "node.name is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("edge-01");
        cfg.node.runtime_version = "2.1.0".to_string();
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.node.name, "edge-01");
        assert_eq!(loaded.node.runtime_version, "2.1.0");
        assert_eq!(loaded.policy, Policy::default());
        assert_eq!(loaded.paths.state, paths::DEFAULT_STATE_FILE);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(Config::load(dir.path()), Err(PackError::NotInitialized)));
    }

    #[test]
    fn minimal_yaml_gets_defaults() {
        let cfg: Config = serde_yaml::from_str("node:\n  name: n1\n").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.node.runtime_version, "0.0.0");
        assert!(cfg.policy.enforce_compat);
        assert!(cfg.policy.enforce_anti_rollback);
        assert_eq!(cfg.paths.audit, paths::DEFAULT_AUDIT_FILE);
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let cfg = Config::new("n1");
        let root = Path::new("/srv/node");
        assert_eq!(cfg.state_path(root), root.join(".packtrust/rollout_state.json"));

        let mut abs = Config::new("n1");
        abs.paths.keyring = "/etc/packtrust/keys.json".to_string();
        assert_eq!(abs.keyring_path(root), PathBuf::from("/etc/packtrust/keys.json"));
    }

    #[test]
    fn validate_default_config_is_clean() {
        assert!(Config::new("n1").validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_versions_as_errors() {
        let mut cfg = Config::new("n1");
        cfg.node.gateway_version = "1.2".to_string();
        cfg.node.runtime_version = "two".to_string();
        let warnings = cfg.validate();
        assert_eq!(
            warnings.iter().filter(|w| w.level == WarnLevel::Error).count(),
            2
        );
        assert!(warnings.iter().any(|w| w.message.contains("node.gateway_version")));
    }

    #[test]
    fn validate_warns_when_gates_disabled() {
        let mut cfg = Config::new("n1");
        cfg.policy.enforce_compat = false;
        cfg.policy.enforce_anti_rollback = false;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
    }
}
