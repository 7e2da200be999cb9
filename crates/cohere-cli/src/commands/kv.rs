use anyhow::Result;
use cohere_proto::manager_service_client::ManagerServiceClient;
use cohere_proto::*;
use tonic::transport::Channel;

pub async fn get(server: &str, key: &str) -> Result<()> {
    let mut client = connect(server).await?;

    match client
        .get(GetRequest {
            key: key.to_string(),
        })
        .await
    {
        Ok(resp) => println!("{}", resp.into_inner().value),
        Err(status) if status.code() == tonic::Code::NotFound => {
            println!("Key '{key}' not found");
        }
        Err(status) => return Err(status.into()),
    }

    Ok(())
}

pub async fn set(server: &str, key: &str, value: &str) -> Result<()> {
    let mut client = connect(server).await?;

    client
        .set(SetRequest {
            key: key.to_string(),
            value: value.to_string(),
        })
        .await?;

    println!("Key '{key}' set successfully");
    Ok(())
}

pub async fn delete(server: &str, key: &str) -> Result<()> {
    let mut client = connect(server).await?;

    match client
        .delete(DeleteRequest {
            key: key.to_string(),
        })
        .await
    {
        Ok(_) => println!("Key '{key}' deleted successfully"),
        Err(status) if status.code() == tonic::Code::NotFound => {
            println!("Key '{key}' not found");
        }
        Err(status) => return Err(status.into()),
    }

    Ok(())
}

async fn connect(server: &str) -> Result<ManagerServiceClient<Channel>> {
    let client = ManagerServiceClient::connect(server.to_string()).await?;
    Ok(client)
}
