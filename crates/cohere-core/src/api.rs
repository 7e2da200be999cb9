//! JSON bodies of the manager's HTTP surface, shared by the manager,
//! the registering nodes and the CLI.

use serde::{Deserialize, Serialize};

use crate::types::NodeInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub grpc_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub server_uuid: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersResponse {
    pub servers: Vec<NodeInfo>,
    pub count: usize,
}
