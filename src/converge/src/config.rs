/// Recovery configuration
/// Loaded from converge.toml
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Locations searched when no config path is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["converge.toml", "/etc/converge/converge.toml"];

/// Deployment profile selecting the default per-operation timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentProfile {
    /// Multi-node control plane: 900s
    #[default]
    Standard,
    /// Single-node deployment where every component restarts on one host: 1200s
    SingleNode,
}

impl DeploymentProfile {
    pub fn default_timeout(self) -> Duration {
        match self {
            DeploymentProfile::Standard => Duration::from_secs(900),
            DeploymentProfile::SingleNode => Duration::from_secs(1200),
        }
    }
}

/// A container or operator to converge, optionally with its own timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TargetSpec")]
pub struct TargetConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl TargetConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeout_secs: None,
        }
    }
}

/// Accepts either `"etcd"` or `{ name = "etcd", timeout_secs = 600 }`
#[derive(Deserialize)]
#[serde(untagged)]
enum TargetSpec {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
}

impl From<TargetSpec> for TargetConfig {
    fn from(raw: TargetSpec) -> Self {
        match raw {
            TargetSpec::Name(name) => TargetConfig::named(name),
            TargetSpec::Full { name, timeout_secs } => TargetConfig { name, timeout_secs },
        }
    }
}

fn default_containers() -> Vec<TargetConfig> {
    ["etcd", "kube-apiserver", "kube-controller-manager", "kube-scheduler"]
        .into_iter()
        .map(TargetConfig::named)
        .collect()
}

fn default_operators() -> Vec<TargetConfig> {
    ["etcd", "kubeapiserver", "kubecontrollermanager", "kubescheduler"]
        .into_iter()
        .map(TargetConfig::named)
        .collect()
}

/// Recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Selects the default timeout when `timeout_secs` is unset
    pub profile: DeploymentProfile,

    /// Per-operation timeout, overriding the profile
    pub timeout_secs: Option<u64>,

    /// Interval between probes
    pub poll_interval_secs: u64,

    /// Upper bound for a single crictl/oc invocation
    pub command_timeout_secs: u64,

    /// Run independent targets of a stage concurrently
    pub parallel: bool,

    pub crictl_path: String,
    pub oc_path: String,
    pub kubeconfig: Option<PathBuf>,

    /// Name of the operator configuration object (`cluster` on OpenShift)
    pub operator_object: String,

    /// Containers whose restart is confirmed, in order
    pub containers: Vec<TargetConfig>,

    /// Operators whose revision rollout is forced and confirmed, in order
    pub operators: Vec<TargetConfig>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            profile: DeploymentProfile::default(),
            timeout_secs: None,
            poll_interval_secs: 10,
            command_timeout_secs: 60,
            parallel: false,
            crictl_path: "crictl".to_string(),
            oc_path: "oc".to_string(),
            kubeconfig: None,
            operator_object: "cluster".to_string(),
            containers: default_containers(),
            operators: default_operators(),
        }
    }
}

impl RecoveryConfig {
    /// Load from `path`, or from the first default location that exists.
    ///
    /// Falls back to defaults when no path is given and nothing is found.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        for candidate in DEFAULT_CONFIG_PATHS {
            let candidate = Path::new(candidate);
            if candidate.exists() {
                return Self::load_file(candidate);
            }
        }

        tracing::info!("No converge.toml found, using defaults");
        Ok(Self::default())
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: RecoveryConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        tracing::info!("Loaded recovery config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RecoveryConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be > 0".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".into()));
        }
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid("command_timeout_secs must be > 0".into()));
        }
        validate_targets("containers", &self.containers)?;
        validate_targets("operators", &self.operators)?;
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.profile.default_timeout())
    }

    pub fn timeout_for(&self, target: &TargetConfig) -> Duration {
        target
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.default_timeout())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn validate_targets(section: &str, targets: &[TargetConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for target in targets {
        if target.name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{}: empty target name", section)));
        }
        if target.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "{}: timeout_secs for {} must be > 0",
                section, target.name
            )));
        }
        if !seen.insert(target.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "{}: duplicate target {}",
                section, target.name
            )));
        }
    }
    Ok(())
}
