//! config.toml parser.
//!
//! ```toml
//! [server]
//! check_cluster_period = "15s"
//! schedule_name = "takeover-schedule"
//!
//! [production]
//! address = "10.0.0.10:8001"
//! scheme = "http"        # kubectl proxy; defaults to "https"
//!
//! [disaster]
//! api_server = "https://10.1.0.10:6443"
//! token = "..."
//!
//! [ecloud]
//! host = "api-beijing-2.cmecloud.cn:8443"
//! access_key = "..."
//! secret_key = "..."
//!
//! [ecloud.auto_scale]
//! increase_num = 3
//!
//! [ecloud.auto_scale.vm_template]
//! cluster_id = "f59ca7a8-fc17-4e82-aef2-4261a855f72f"
//!
//! [ecloud.auto_scale.vm_template.infrastructure]
//! cpu = 2
//! ...
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::VMTemplate;

/// Nodes added per grow when the config does not say.
pub const DEFAULT_INCREASE_NUM: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub production: ProductionConfig,
    pub disaster: DisasterConfig,
    pub ecloud: Option<EcloudConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// How often the production cluster is probed, e.g. "15s".
    #[serde(default = "default_check_cluster_period")]
    pub check_cluster_period: String,
    /// Velero schedule whose backups are eligible for restore.
    #[serde(default = "default_schedule_name")]
    pub schedule_name: String,
    /// Grow the disaster cluster before restoring into it.
    #[serde(default)]
    pub grow_on_failover: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            check_cluster_period: default_check_cluster_period(),
            schedule_name: default_schedule_name(),
            grow_on_failover: false,
        }
    }
}

/// The cluster being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// `host:port` of the API server (or a `kubectl proxy` in front of it).
    pub address: String,
    #[serde(default = "default_liveness_path")]
    pub liveness_path: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
    /// "https" for a kube-apiserver, "http" for a `kubectl proxy`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Bearer token for the API server.
    pub token: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl ProductionConfig {
    /// `{scheme}://{address}`.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.address)
    }

    /// Whether the raw HTTP probe is enough: plain http, no credentials.
    pub fn is_plain_http(&self) -> bool {
        self.scheme == "http" && self.token.is_none()
    }
}

/// The cluster backups are restored into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisasterConfig {
    /// Base URL of the API server, e.g. "https://10.1.0.10:6443".
    pub api_server: String,
    /// Bearer token for the API server.
    pub token: Option<String>,
    /// Namespace Velero runs in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcloudConfig {
    pub host: String,
    pub access_key: String,
    pub secret_key: String,
    pub auto_scale: AutoScaleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScaleConfig {
    pub increase_num: Option<u32>,
    pub vm_template: VMTemplate,
}

impl AutoScaleConfig {
    pub fn increase_num(&self) -> u32 {
        self.increase_num.unwrap_or(DEFAULT_INCREASE_NUM)
    }
}

impl TakeoverConfig {
    /// Read, complete, and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let mut config: TakeoverConfig = toml::from_str(content)?;
        config.complete();
        config.validate()?;
        Ok(config)
    }

    /// Fill in defaults that serde cannot express.
    pub fn complete(&mut self) {
        if let Some(ecloud) = &mut self.ecloud
            && ecloud.auto_scale.increase_num.is_none()
        {
            ecloud.auto_scale.increase_num = Some(DEFAULT_INCREASE_NUM);
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let period = parse_duration(&self.server.check_cluster_period).ok_or_else(|| {
            ConfigError::Invalid {
                field: "server.check_cluster_period",
                reason: format!("cannot parse duration {:?}", self.server.check_cluster_period),
            }
        })?;
        if period.is_zero() {
            return Err(ConfigError::Invalid {
                field: "server.check_cluster_period",
                reason: "must be greater than zero".to_string(),
            });
        }
        require(&self.server.schedule_name, "server.schedule_name")?;

        require(&self.production.address, "production.address")?;
        if !self.production.liveness_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "production.liveness_path",
                reason: "must start with '/'".to_string(),
            });
        }
        let timeout = parse_duration(&self.production.probe_timeout).ok_or_else(|| {
            ConfigError::Invalid {
                field: "production.probe_timeout",
                reason: format!("cannot parse duration {:?}", self.production.probe_timeout),
            }
        })?;
        if timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "production.probe_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !matches!(self.production.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "production.scheme",
                reason: format!("expected \"http\" or \"https\", got {:?}", self.production.scheme),
            });
        }

        require(&self.disaster.api_server, "disaster.api_server")?;
        require(&self.disaster.namespace, "disaster.namespace")?;

        if let Some(ecloud) = &self.ecloud {
            ecloud.validate()?;
        }
        Ok(())
    }

    pub fn check_cluster_period(&self) -> Duration {
        parse_duration(&self.server.check_cluster_period).unwrap_or(Duration::from_secs(15))
    }

    pub fn probe_timeout(&self) -> Duration {
        parse_duration(&self.production.probe_timeout).unwrap_or(Duration::from_secs(5))
    }

    /// The ecloud section, for commands that cannot run without it.
    pub fn ecloud(&self) -> ConfigResult<&EcloudConfig> {
        self.ecloud.as_ref().ok_or(ConfigError::EcloudMissing)
    }
}

impl EcloudConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        require(&self.host, "ecloud.host")?;
        require(&self.access_key, "ecloud.access_key")?;
        require(&self.secret_key, "ecloud.secret_key")?;
        if self.auto_scale.increase_num == Some(0) {
            return Err(ConfigError::Invalid {
                field: "ecloud.auto_scale.increase_num",
                reason: "must be greater than zero".to_string(),
            });
        }
        validate_vm_template(&self.auto_scale.vm_template)
    }
}

/// Check a VM template before any node is requested with it.
pub fn validate_vm_template(template: &VMTemplate) -> ConfigResult<()> {
    require(&template.cluster_id, "vm_template.cluster_id")?;

    let infra = &template.infrastructure;
    non_zero(infra.cpu, "infrastructure.cpu")?;
    non_zero(infra.ram, "infrastructure.ram")?;
    non_zero(infra.disk, "infrastructure.disk")?;

    let has_password = infra.password.as_deref().is_some_and(|p| !p.is_empty());
    let has_keypair = infra.keypair.as_deref().is_some_and(|k| !k.is_empty());
    if has_password && has_keypair {
        return Err(ConfigError::Invalid {
            field: "infrastructure",
            reason: "only one of password or keypair may be set".to_string(),
        });
    }

    non_zero(infra.volumes.system_disk.size, "infrastructure.volumes.system_disk.size")?;
    non_zero(infra.volumes.data_disk.size, "infrastructure.volumes.data_disk.size")?;
    require(&infra.specs_name, "infrastructure.specs_name")?;
    Ok(())
}

fn require(value: &str, field: &'static str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Ok(())
}

fn non_zero(value: u32, field: &'static str) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "value is 0".to_string(),
        });
    }
    Ok(())
}

/// Parse a duration string like "15s", "500ms", "2m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Config file location: `$TAKEOVER_CONFIG`, else
/// `$HOME/.takeover/config/config.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("TAKEOVER_CONFIG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".takeover")
                .join("config")
                .join("config.toml")
        }
    }
}

fn default_check_cluster_period() -> String {
    "15s".to_string()
}

fn default_schedule_name() -> String {
    "takeover-schedule".to_string()
}

fn default_liveness_path() -> String {
    "/livez".to_string()
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_namespace() -> String {
    match std::env::var("VELERO_NAMESPACE") {
        Ok(ns) if !ns.is_empty() => ns,
        _ => "velero".to_string(),
    }
}
