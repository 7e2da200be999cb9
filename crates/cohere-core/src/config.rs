use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub grpc_addr: String,
    pub http_addr: String,
    pub shutdown_timeout_secs: u64,
    pub health: HealthConfig,
    pub client: ClientConfig,
}

/// Liveness sweep settings for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub interval_ms: u64,
    pub probe_timeout_ms: u64,
    /// Consecutive failed sweeps before a node is evicted.
    pub failure_threshold: u32,
}

/// Deadlines applied to every outbound RPC towards a storage node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub region: String,
    pub grpc_addr: String,
    /// Address announced to the manager. Falls back to `grpc_addr`.
    pub advertise_addr: Option<String>,
    pub manager_http_addr: String,
    /// Parent of the per-region database directory `db_<region>`.
    pub data_dir: String,
    /// Keep data in memory only; nothing is written under `data_dir`.
    pub in_memory: bool,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "0.0.0.0:50051".to_string(),
            http_addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 10,
            health: HealthConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            probe_timeout_ms: 2_000,
            failure_threshold: 1,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            region: "local".to_string(),
            grpc_addr: "0.0.0.0:50061".to_string(),
            advertise_addr: None,
            manager_http_addr: "127.0.0.1:8080".to_string(),
            data_dir: "data".to_string(),
            in_memory: false,
            registration: RegistrationConfig::default(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl NodeConfig {
    pub fn announced_addr(&self) -> &str {
        self.advertise_addr.as_deref().unwrap_or(&self.grpc_addr)
    }

    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(format!("db_{}", self.region))
    }
}

impl ManagerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        load_layered(ManagerConfig::default(), config_path, "COHERE_MANAGER_")
    }
}

impl NodeConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, figment::Error> {
        load_layered(NodeConfig::default(), config_path, "COHERE_NODE_")
    }
}

fn load_layered<T>(defaults: T, config_path: Option<&str>, env_prefix: &str) -> Result<T, figment::Error>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut figment = Figment::from(Serialized::defaults(defaults));

    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(env_prefix).split("__"));

    figment.extract()
}
