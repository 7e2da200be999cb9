use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use cohere_core::RegistrationConfig;
use cohere_core::api::{RegisterRequest, RegisterResponse};

use crate::error::RegistrationError;
use crate::retry::RetryPolicy;

/// Announces this node to the manager's `POST /register` endpoint.
#[derive(Clone)]
pub struct RegistrationClient {
    http: reqwest::Client,
    register_url: String,
}

impl RegistrationClient {
    pub fn new(manager_http_addr: &str) -> Result<Self, RegistrationError> {
        let base = if manager_http_addr.starts_with("http://")
            || manager_http_addr.starts_with("https://")
        {
            manager_http_addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{manager_http_addr}")
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            register_url: format!("{base}/register"),
        })
    }

    /// Single registration attempt. Returns the assigned server uuid.
    pub async fn register(&self, region: &str, grpc_addr: &str) -> Result<String, RegistrationError> {
        let resp = self
            .http
            .post(&self.register_url)
            .json(&RegisterRequest {
                region: region.to_string(),
                grpc_addr: grpc_addr.to_string(),
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: RegisterResponse = resp.json().await?;
        if !body.success || body.server_uuid.is_empty() {
            return Err(RegistrationError::Rejected {
                status: status.as_u16(),
                message: body.message,
            });
        }

        Ok(body.server_uuid)
    }

    /// Retry [`Self::register`] with exponential backoff until the manager
    /// accepts the node or `shutdown` flips.
    pub async fn register_with_retry(
        &self,
        region: &str,
        grpc_addr: &str,
        config: &RegistrationConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<String, RegistrationError> {
        let mut policy = RetryPolicy::new(config);

        loop {
            if *shutdown.borrow() {
                return Err(RegistrationError::ShuttingDown);
            }

            match self.register(region, grpc_addr).await {
                Ok(server_uuid) => {
                    info!(
                        server_uuid = %server_uuid,
                        url = %self.register_url,
                        attempts = policy.attempt() + 1,
                        "Registered with manager"
                    );
                    return Ok(server_uuid);
                }
                Err(e) => {
                    let delay = policy.next_delay();
                    warn!(
                        url = %self.register_url,
                        attempt = policy.attempt(),
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Registration failed, retrying"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return Err(RegistrationError::ShuttingDown);
                            }
                        }
                    }
                }
            }
        }
    }
}
