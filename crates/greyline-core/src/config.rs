//! greyline.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;
use crate::types::Node;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// Errors raised while loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GreylineConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub healer: HealerConfig,
    #[serde(default)]
    pub alerting: AlertingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Fixed delay between the end of one cycle and the start of the next.
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Where to persist cluster state. In-memory only when unset.
    pub state_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            state_path: None,
        }
    }
}

impl AgentConfig {
    pub fn interval(&self) -> Duration {
        parse_duration(&self.interval).unwrap_or(DEFAULT_INTERVAL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<Node>,
}

/// Which classifier implementation to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierConfig {
    /// Deterministic thresholds over the report's signals.
    Rules,
    /// Progresses nodes carrying `unstable_marker` through warning and
    /// critical as the classifier's call count grows.
    Scripted {
        #[serde(default = "default_warning_after")]
        warning_after: u64,
        #[serde(default = "default_critical_after")]
        critical_after: u64,
        #[serde(default = "default_unstable_marker")]
        unstable_marker: String,
    },
    /// OpenAI-compatible chat completion endpoint.
    Llm {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_llm_timeout")]
        timeout: String,
    },
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig::Scripted {
            warning_after: default_warning_after(),
            critical_after: default_critical_after(),
            unstable_marker: default_unstable_marker(),
        }
    }
}

impl ClassifierConfig {
    /// Short name used in startup logs.
    pub fn mode(&self) -> &'static str {
        match self {
            ClassifierConfig::Rules => "rules",
            ClassifierConfig::Scripted { .. } => "scripted",
            ClassifierConfig::Llm { .. } => "llm",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricsConfig {
    /// Random jitter around a healthy baseline; nodes carrying
    /// `unstable_marker` degrade often.
    Simulated {
        #[serde(default = "default_unstable_marker")]
        unstable_marker: String,
    },
    /// Every node reports the healthy baseline.
    Static,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig::Simulated {
            unstable_marker: default_unstable_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerConfig {
    /// Address template for new nodes; `{i}` is replaced by the sequence number.
    #[serde(default = "default_address_template")]
    pub address_template: String,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    #[serde(default = "default_provision_delay")]
    pub provision_delay: String,
    #[serde(default = "default_membership_delay")]
    pub membership_delay: String,
    #[serde(default)]
    pub membership: MembershipConfig,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            address_template: default_address_template(),
            id_prefix: default_id_prefix(),
            provision_delay: default_provision_delay(),
            membership_delay: default_membership_delay(),
            membership: MembershipConfig::default(),
        }
    }
}

impl HealerConfig {
    pub fn provision_delay(&self) -> Duration {
        parse_duration(&self.provision_delay).unwrap_or(Duration::from_secs(2))
    }

    pub fn membership_delay(&self) -> Duration {
        parse_duration(&self.membership_delay).unwrap_or(Duration::from_secs(1))
    }
}

/// How peers are added to and removed from the consensus group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipConfig {
    #[default]
    Simulated,
    /// Run an external admin tool. `{address}` in any argument is replaced
    /// with the peer address.
    Command { join: Vec<String>, leave: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_recipient")]
    pub recipient: String,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recipient: default_recipient(),
        }
    }
}

impl GreylineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: GreylineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.nodes.is_empty() {
            return Err(ConfigError::Invalid(
                "cluster.nodes must list at least one node".into(),
            ));
        }

        let mut seen = HashSet::new();
        for node in &self.cluster.nodes {
            if node.id.is_empty() || node.address.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "node {:?} needs both an id and an address",
                    node.id
                )));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
        }

        check_duration("agent.interval", &self.agent.interval)?;
        if parse_duration(&self.agent.interval).is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Invalid("agent.interval must be greater than zero".into()));
        }
        check_duration("healer.provision_delay", &self.healer.provision_delay)?;
        check_duration("healer.membership_delay", &self.healer.membership_delay)?;

        match &self.classifier {
            ClassifierConfig::Scripted {
                warning_after,
                critical_after,
                ..
            } if critical_after <= warning_after => {
                return Err(ConfigError::Invalid(format!(
                    "critical_after ({critical_after}) must exceed warning_after ({warning_after})"
                )));
            }
            ClassifierConfig::Llm { timeout, .. } => {
                check_duration("classifier.timeout", timeout)?
            }
            _ => {}
        }

        if !self.healer.address_template.contains("{i}") {
            return Err(ConfigError::Invalid(
                "healer.address_template must contain {i}".into(),
            ));
        }

        if let MembershipConfig::Command { join, leave } = &self.healer.membership {
            if join.is_empty() || leave.is_empty() {
                return Err(ConfigError::Invalid(
                    "healer.membership command needs non-empty join and leave argv".into(),
                ));
            }
        }

        Ok(())
    }
}

fn check_duration(field: &str, value: &str) -> Result<(), ConfigError> {
    parse_duration(value)
        .map(|_| ())
        .ok_or_else(|| ConfigError::Invalid(format!("{field}: bad duration {value:?}")))
}

fn default_interval() -> String {
    "15s".to_string()
}

fn default_warning_after() -> u64 {
    3
}

fn default_critical_after() -> u64 {
    5
}

fn default_unstable_marker() -> String {
    "unstable".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "GREYLINE_LLM_API_KEY".to_string()
}

fn default_llm_timeout() -> String {
    "30s".to_string()
}

fn default_address_template() -> String {
    "192.168.1.20{i}".to_string()
}

fn default_id_prefix() -> String {
    "node-new".to_string()
}

fn default_provision_delay() -> String {
    "2s".to_string()
}

fn default_membership_delay() -> String {
    "1s".to_string()
}

fn default_recipient() -> String {
    "admin@distributedsystem.com".to_string()
}

fn default_true() -> bool {
    true
}
