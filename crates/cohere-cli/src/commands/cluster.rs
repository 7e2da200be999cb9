use anyhow::Result;
use cohere_core::api::{HealthResponse, ServersResponse};

pub async fn servers(http: &str) -> Result<()> {
    let resp: ServersResponse = reqwest::get(format!("{}/servers", http.trim_end_matches('/')))
        .await?
        .error_for_status()?
        .json()
        .await?;

    if resp.servers.is_empty() {
        println!("No registered servers");
        return Ok(());
    }

    println!("{:<38} {:<12} ADDRESS", "ID", "REGION");
    for server in &resp.servers {
        println!("{:<38} {:<12} {}", server.id.0, server.region, server.address);
    }
    println!("{} server(s)", resp.count);

    Ok(())
}

pub async fn health(http: &str) -> Result<()> {
    let resp: HealthResponse = reqwest::get(format!("{}/health", http.trim_end_matches('/')))
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!("{} at {}", resp.status, resp.time);
    Ok(())
}
