use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::resolve_secret;
use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_EXTENSIONS, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_LIST_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_HOSTS, DEFAULT_SEARCH_ROOTS,
    DEFAULT_SHARE, FALLBACK_CLIENT_NAME, SMB_DEFAULT_PORT,
};
use crate::errors::CollectError;
use crate::security::validate_component;

/// Account used to open a session to a host.
///
/// Flattened into the host entry, so `username`, `password` and `domain`
/// sit next to `address` in the configuration file.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub domain: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Credentials {
    /// `DOMAIN\user`, or just `user` without a domain
    pub fn qualified_username(&self) -> String {
        if self.domain.is_empty() {
            self.username.clone()
        } else {
            format!("{}\\{}", self.domain, self.username)
        }
    }
}

/// A Windows account whose archives are collected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub username: String,
    /// Overrides the default search roots when present and non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_roots: Option<Vec<String>>,
}

impl UserConfig {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            search_roots: None,
        }
    }

    pub fn with_search_roots(mut self, roots: &[&str]) -> Self {
        self.search_roots = Some(roots.iter().map(|r| r.to_string()).collect());
        self
    }

    /// Templates scanned for this user: the override, else `defaults`.
    pub fn search_root_templates<'a>(&'a self, defaults: &'a [String]) -> &'a [String] {
        match &self.search_roots {
            Some(roots) if !roots.is_empty() => roots,
            _ => defaults,
        }
    }
}

/// How to reach one Windows host and whose files to take from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    #[serde(alias = "host")]
    pub address: String,
    pub server_name: String,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub shares: Vec<String>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl HostConfig {
    pub fn new(address: &str, server_name: &str) -> Self {
        Self {
            address: address.to_string(),
            server_name: server_name.to_string(),
            credentials: Credentials::default(),
            port: SMB_DEFAULT_PORT,
            shares: Vec::new(),
            users: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: UserConfig) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_shares(mut self, shares: &[&str]) -> Self {
        self.shares = shares.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Configured shares, or `["C$"]` when none are listed.
    pub fn effective_shares(&self) -> Vec<String> {
        if self.shares.is_empty() {
            vec![DEFAULT_SHARE.to_string()]
        } else {
            self.shares.clone()
        }
    }
}

/// Timeouts applied to every remote store call, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_secs")]
    pub connect_secs: u64,
    #[serde(default = "default_list_secs")]
    pub list_secs: u64,
    /// Idle timeout: bounds opening a remote file and each read from it
    #[serde(default = "default_fetch_secs")]
    pub fetch_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            list_secs: DEFAULT_LIST_TIMEOUT_SECS,
            fetch_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list_secs)
    }

    pub fn fetch(&self) -> Duration {
        Duration::from_secs(self.fetch_secs)
    }
}

/// Top-level collector configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectorConfig {
    /// NetBIOS name presented to hosts; defaults to the local hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Share-root template for the mounted store (`{address}`, `{server}`, `{share}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_root: Option<String>,
    #[serde(default = "default_search_roots")]
    pub default_search_roots: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub follow_links: bool,
    #[serde(default = "default_max_concurrent_hosts")]
    pub max_concurrent_hosts: usize,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            client_name: None,
            share_root: None,
            default_search_roots: default_search_roots(),
            extensions: default_extensions(),
            max_depth: None,
            follow_links: false,
            max_concurrent_hosts: DEFAULT_MAX_CONCURRENT_HOSTS,
            timeouts: TimeoutConfig::default(),
            hosts: Vec::new(),
        }
    }
}

impl CollectorConfig {
    /// Load, resolve and validate a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    /// Password references to environment variables are resolved here, so
    /// the returned value is ready for a run.
    pub fn from_file(path: &Path) -> Result<Self, CollectError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CollectError::Config(format!("failed to read config file {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };

        config.process_environment_variables()?;
        config.normalize();
        config.validate()?;

        debug!("Loaded configuration with {} host(s) from {}", config.hosts.len(), path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CollectError> {
        serde_yaml::from_str(content)
            .map_err(|e| CollectError::Config(format!("failed to parse YAML config: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self, CollectError> {
        serde_json::from_str(content)
            .map_err(|e| CollectError::Config(format!("failed to parse JSON config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Replace `${VAR}` and `%VAR%` password references (and a bare `$VAR` when
    /// that variable is set) with the variable's value.
    pub fn process_environment_variables(&mut self) -> Result<(), CollectError> {
        for host in &mut self.hosts {
            host.credentials.password = resolve_secret(&host.credentials.password)
                .map_err(|name| {
                    CollectError::Config(format!(
                        "host {}: password references environment variable {} which is not set",
                        host.address, name
                    ))
                })?;
        }
        Ok(())
    }

    /// Apply defaulting rules: lower-case extensions without leading dots,
    /// trimmed names, empty search-root overrides treated as absent.
    pub fn normalize(&mut self) {
        self.extensions = self
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        for host in &mut self.hosts {
            host.address = host.address.trim().to_string();
            host.server_name = host.server_name.trim().to_string();
            host.shares = host.shares.iter().map(|s| s.trim().to_string()).collect();

            for user in &mut host.users {
                user.username = user.username.trim().to_string();
                if matches!(&user.search_roots, Some(roots) if roots.is_empty()) {
                    user.search_roots = None;
                }
            }
        }
    }

    /// Check the invariants the runner relies on.
    pub fn validate(&self) -> Result<(), CollectError> {
        if self.hosts.is_empty() {
            return Err(CollectError::Config("no hosts defined in configuration".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(CollectError::Config("extension allow-list is empty".to_string()));
        }
        if self.max_concurrent_hosts == 0 {
            return Err(CollectError::Config("max_concurrent_hosts must be at least 1".to_string()));
        }
        if self.timeouts.connect_secs == 0 || self.timeouts.list_secs == 0 || self.timeouts.fetch_secs == 0 {
            return Err(CollectError::Config("timeouts must be greater than zero".to_string()));
        }

        let mut seen = HashSet::new();
        for (index, host) in self.hosts.iter().enumerate() {
            if host.address.is_empty() {
                return Err(CollectError::Config(format!("host #{} has an empty address", index + 1)));
            }
            if host.server_name.is_empty() {
                return Err(CollectError::Config(format!(
                    "host {} has an empty server_name",
                    host.address
                )));
            }
            validate_component(&host.address).map_err(|reason| {
                CollectError::Config(format!("host address {:?} {}", host.address, reason))
            })?;
            if !seen.insert(host.address.to_ascii_lowercase()) {
                return Err(CollectError::Config(format!(
                    "host address {} is configured more than once",
                    host.address
                )));
            }

            for share in &host.shares {
                validate_component(share).map_err(|reason| {
                    CollectError::Config(format!("host {}: share {:?} {}", host.address, share, reason))
                })?;
            }

            for user in &host.users {
                if user.username.is_empty() {
                    return Err(CollectError::Config(format!(
                        "host {} has a user with an empty username",
                        host.address
                    )));
                }
            }

            if host.users.is_empty() {
                warn!("No users configured for host {}; it will be skipped", host.address);
            }
        }

        Ok(())
    }

    /// Client name presented to hosts.
    pub fn client_name(&self) -> String {
        if let Some(name) = self.client_name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }

        hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string())
            .filter(|h| !h.is_empty())
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .unwrap_or_else(|| FALLBACK_CLIENT_NAME.to_string())
    }
}

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<CollectorConfig, CollectError> {
    if !path.exists() {
        return Err(CollectError::Config(format!(
            "configuration file {} does not exist",
            path.display()
        )));
    }
    CollectorConfig::from_file(path)
}

fn default_port() -> u16 {
    SMB_DEFAULT_PORT
}

fn default_connect_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_list_secs() -> u64 {
    DEFAULT_LIST_TIMEOUT_SECS
}

fn default_fetch_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_max_concurrent_hosts() -> usize {
    DEFAULT_MAX_CONCURRENT_HOSTS
}

pub fn default_search_roots() -> Vec<String> {
    DEFAULT_SEARCH_ROOTS.iter().map(|r| r.to_string()).collect()
}

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}
