//! Configuration of the agents exposed as tools.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_API_VERSION;
use crate::error::{Error, Result};

/// Endpoint used when neither the file nor the command line names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateConfig {
    /// Base URL of the deployments.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// API key used when a call does not bring its own.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Seconds to wait for the next chunk before giving up.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Agents exposed as tools.
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentConfig>,
}

/// One agent exposed as a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Tool name; also the key of this agent's slice in shared state.
    pub name: String,
    /// Deployment to call.
    pub deployment: String,
    /// Description shown to the calling model.
    #[serde(default)]
    pub description: String,
}

impl AgentConfig {
    /// Create an agent entry.
    pub fn new(
        name: impl Into<String>,
        deployment: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            deployment: deployment.into(),
            description: description.into(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new(
            "calculations_agent",
            "calculations-agent",
            "Performs calculations and runs Python code for numeric or data work.",
        ),
        AgentConfig::new(
            "content_management_agent",
            "content-management-agent",
            "Reads attached files and answers questions about their content.",
        ),
        AgentConfig::new(
            "web_search_agent",
            "web-search-agent",
            "Searches the web and summarizes what it finds.",
        ),
    ]
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            agents: default_agents(),
        }
    }
}

impl DelegateConfig {
    /// Parse a TOML document.
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&source)
    }

    /// Idle timeout between chunks.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".into()));
        }
        for (i, agent) in self.agents.iter().enumerate() {
            if agent.name.is_empty() || agent.deployment.is_empty() {
                return Err(Error::Config(format!(
                    "agent #{} needs both name and deployment",
                    i
                )));
            }
            if self.agents[..i].iter().any(|a| a.name == agent.name) {
                return Err(Error::Config(format!("duplicate agent name: {}", agent.name)));
            }
        }
        Ok(())
    }
}
