//! toolbench configuration
//!
//! Loaded from `~/.config/toolbench/config.toml`. Every field has a default,
//! so a missing file (or a missing section) yields a working configuration.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("toolbench"))
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolbenchConfig {
    pub general: GeneralConfig,
    pub retry: RetrySection,
    pub components: ComponentsConfig,
    pub jenkins: JenkinsConfig,
    pub terraform: TerraformConfig,
    pub aws_cli: AwsCliConfig,
    pub sandbox: SandboxConfig,
}

impl ToolbenchConfig {
    /// Load the configuration.
    ///
    /// An explicit `path` must exist; the default location may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                bail!("Config file not found: {}", path.display());
            }
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.general.command_timeout_secs == 0 {
            bail!("general.command_timeout_secs must be positive");
        }
        if self.general.fetch_timeout_secs == 0 {
            bail!("general.fetch_timeout_secs must be positive");
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn retry_config(&self) -> convergence::RetryConfig {
        convergence::RetryConfig::fixed(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.delay_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Per-command timeout
    pub command_timeout_secs: u64,
    /// Whole-request timeout for downloads
    pub fetch_timeout_secs: u64,
    /// Where artifacts are downloaded before installation
    pub download_dir: String,
    /// Packages installed before everything else
    pub prerequisites: Vec<String>,
    /// Java runtime package required by Jenkins
    pub java_package: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 600,
            fetch_timeout_secs: 300,
            download_dir: std::env::temp_dir()
                .join("toolbench")
                .display()
                .to_string(),
            prerequisites: ["curl", "gnupg", "unzip", "ca-certificates", "lsb-release"]
                .map(String::from)
                .to_vec(),
            java_package: "openjdk-17-jre".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// Attempts per artifact fetch, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 2,
        }
    }
}

/// Per-component enable flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub prerequisites: bool,
    pub java: bool,
    pub jenkins: bool,
    pub terraform: bool,
    pub ansible: bool,
    pub aws_cli: bool,
    pub sandbox: bool,
    /// Also purge the prerequisite packages on rollback
    pub remove_prerequisites: bool,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            prerequisites: true,
            java: true,
            jenkins: true,
            terraform: true,
            ansible: true,
            aws_cli: true,
            sandbox: false,
            remove_prerequisites: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JenkinsConfig {
    pub repo_url: String,
    pub key_url: String,
    pub war_url: String,
    /// Install directory for the standalone WAR fallback
    pub install_dir: String,
    pub http_port: u16,
    /// Smallest plausible WAR size
    pub min_war_bytes: u64,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://pkg.jenkins.io/debian-stable".to_string(),
            key_url: "https://pkg.jenkins.io/debian-stable/jenkins.io-2023.key".to_string(),
            war_url: "https://get.jenkins.io/war-stable/latest/jenkins.war".to_string(),
            install_dir: "/opt/jenkins".to_string(),
            http_port: 8080,
            min_war_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformConfig {
    pub repo_url: String,
    pub key_url: String,
    /// Distribution codename; detected with `lsb_release -cs` when unset
    pub codename: Option<String>,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://apt.releases.hashicorp.com".to_string(),
            key_url: "https://apt.releases.hashicorp.com/gpg".to_string(),
            codename: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsCliConfig {
    pub url: String,
    pub install_dir: String,
    pub bin_dir: String,
    /// Smallest plausible bundle size
    pub min_bytes: u64,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            url: "https://awscli.amazonaws.com/awscli-exe-linux-x86_64.zip".to_string(),
            install_dir: "/usr/local/aws-cli".to_string(),
            bin_dir: "/usr/local/bin".to_string(),
            min_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Developer sandbox stack applied with terraform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory holding the terraform configuration
    pub dir: String,
    pub var_file: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            dir: "~/.config/toolbench/sandbox".to_string(),
            var_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ToolbenchConfig::parse("").unwrap();
        assert_eq!(config, ToolbenchConfig::default());
        assert_eq!(config.general.command_timeout_secs, 600);
        assert_eq!(config.general.fetch_timeout_secs, 300);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(!config.components.sandbox);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = ToolbenchConfig::parse(
            r#"
[retry]
max_attempts = 5

[components]
ansible = false
sandbox = true

[sandbox]
dir = "/srv/sandbox"
"#,
        )
        .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_secs, 2);
        assert!(!config.components.ansible);
        assert!(config.components.jenkins);
        assert!(config.components.sandbox);
        assert_eq!(config.sandbox.dir, "/srv/sandbox");
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let err = ToolbenchConfig::parse("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let err = ToolbenchConfig::parse("[general]\nfetch_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_secs"));
        let err = ToolbenchConfig::parse("[general]\ncommand_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("command_timeout_secs"));
    }

    #[test]
    fn test_rejects_unknown_types() {
        assert!(ToolbenchConfig::parse("[general]\ncommand_timeout_secs = \"soon\"\n").is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ToolbenchConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[jenkins]\nhttp_port = 9090\n").unwrap();
        let config = ToolbenchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.jenkins.http_port, 9090);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = ToolbenchConfig::default();
        let rendered = config.to_toml().unwrap();
        assert_eq!(ToolbenchConfig::parse(&rendered).unwrap(), config);
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/sandbox");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with("sandbox"));
    }
}
