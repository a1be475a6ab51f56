use crate::chat::ChatSink;
use crate::formatters::{bullet_list, flavor_info, image_info, server_info};
use nimbus_common::{Server, ServerCreateRequest, ServerStatus};
use nimbus_providers::ComputeProvider;
use regex::RegexBuilder;
use std::time::Duration;
use tokio::time::{sleep, timeout};

pub const NO_SERVERS: &str = "No provisioned servers";

/// Everything that can end a command early. The dispatcher replies with the Display text.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Flavor not found.")]
    FlavorNotFound,
    #[error("Image not found.")]
    ImageNotFound,
    #[error("Invalid server name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Several servers are named '{0}', delete by id instead.")]
    AmbiguousServer(String),
    #[error("Server {name} entered {status} status")]
    ServerFailed { name: String, status: ServerStatus },
    #[error("Timed out after {secs}s waiting for server {name} to become RUNNING")]
    WaitTimeout { name: String, secs: u64 },
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

pub type ActionResult = Result<(), CommandError>;

/// Polling policy for a freshly created server.
#[derive(Clone, Copy, Debug)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

pub async fn list_flavors(client: &dyn ComputeProvider, chat: &dyn ChatSink) -> ActionResult {
    let flavors = client.list_flavors().await?;
    chat.reply(bullet_list(&flavors, flavor_info)).await;
    Ok(())
}

pub async fn show_flavor(client: &dyn ComputeProvider, chat: &dyn ChatSink, id: &str) -> ActionResult {
    let flavor = client.get_flavor(id).await?;
    chat.reply(flavor_info(&flavor)).await;
    Ok(())
}

pub async fn list_servers(
    client: &dyn ComputeProvider,
    chat: &dyn ChatSink,
    pattern: Option<&str>,
) -> ActionResult {
    // Compile before the remote call so a bad pattern costs nothing.
    let matcher = pattern
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .transpose()?;
    let servers = client.list_servers().await?;

    match matcher {
        Some(re) => {
            let matching: Vec<Server> = servers
                .into_iter()
                .filter(|s| re.is_match(&s.name))
                .collect();
            // A filtered list with no match replies with an empty body; only the
            // unfiltered listing announces emptiness.
            chat.reply(bullet_list(&matching, server_info)).await;
        }
        None if servers.is_empty() => chat.reply(NO_SERVERS.to_string()).await,
        None => chat.reply(bullet_list(&servers, server_info)).await,
    }
    Ok(())
}

pub async fn show_server(client: &dyn ComputeProvider, chat: &dyn ChatSink, id: &str) -> ActionResult {
    let server = client.get_server(id).await?;
    chat.reply(server_info(&server)).await;
    Ok(())
}

/// flavors -> images -> resolve by exact name -> create -> wait until RUNNING.
pub async fn create_server(
    client: &dyn ComputeProvider,
    chat: &dyn ChatSink,
    name: &str,
    flavor_name: &str,
    image_name: &str,
    key_name: &str,
    wait: WaitPolicy,
) -> ActionResult {
    let flavors = client.list_flavors().await?;
    let images = client.list_images().await?;

    let flavor = flavors
        .iter()
        .find(|f| f.name == flavor_name)
        .ok_or(CommandError::FlavorNotFound)?;
    let image = images
        .iter()
        .find(|i| i.name == image_name)
        .ok_or(CommandError::ImageNotFound)?;

    let request = ServerCreateRequest {
        name: name.to_string(),
        flavor_id: flavor.id.clone(),
        image_id: image.id.clone(),
        key_name: key_name.to_string(),
    };
    tracing::info!(
        "🚀 Creating server {} (flavor={}, image={}, key={})",
        request.name,
        request.flavor_id,
        request.image_id,
        request.key_name
    );
    let server = client.create_server(&request).await?;
    chat.reply(format!(
        "Server created: {}, waiting for active status",
        server.name
    ))
    .await;

    let ready = wait_until_running(client, &server, wait).await?;
    chat.reply(server_info(&ready)).await;
    Ok(())
}

/// Polls the server every `interval` until it is RUNNING, fails, or `timeout` elapses.
pub async fn wait_until_running(
    client: &dyn ComputeProvider,
    server: &Server,
    wait: WaitPolicy,
) -> Result<Server, CommandError> {
    match timeout(wait.timeout, poll_until_settled(client, &server.id, wait.interval)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!("⚠️ Gave up waiting for server {} after {:?}", server.id, wait.timeout);
            Err(CommandError::WaitTimeout {
                name: server.name.clone(),
                secs: wait.timeout.as_secs(),
            })
        }
    }
}

async fn poll_until_settled(
    client: &dyn ComputeProvider,
    server_id: &str,
    interval: Duration,
) -> Result<Server, CommandError> {
    loop {
        sleep(interval).await;
        let current = client.get_server(server_id).await?;
        tracing::debug!("⏳ Server {} status={}", current.id, current.status);
        if current.is_running() {
            return Ok(current);
        }
        if current.status.is_terminal() {
            return Err(CommandError::ServerFailed {
                name: current.name,
                status: current.status,
            });
        }
    }
}

/// Deletes by id, or by exact name when no server carries that id.
pub async fn delete_server(client: &dyn ComputeProvider, chat: &dyn ChatSink, target: &str) -> ActionResult {
    let servers = client.list_servers().await?;
    let server_id = match servers.iter().find(|s| s.id == target) {
        Some(server) => server.id.clone(),
        None => {
            let named: Vec<&Server> = servers.iter().filter(|s| s.name == target).collect();
            match named.as_slice() {
                [only] => only.id.clone(),
                [] => target.to_string(),
                _ => return Err(CommandError::AmbiguousServer(target.to_string())),
            }
        }
    };

    let deleted = client.destroy_server(&server_id).await?;
    chat.reply(format!("Server {}  Deleted", deleted)).await;
    Ok(())
}

pub async fn list_images(client: &dyn ComputeProvider, chat: &dyn ChatSink) -> ActionResult {
    let images = client.list_images().await?;
    chat.reply(bullet_list(&images, image_info)).await;
    Ok(())
}

pub async fn show_image(client: &dyn ComputeProvider, chat: &dyn ChatSink, id: &str) -> ActionResult {
    let image = client.get_image(id).await?;
    chat.reply(image_info(&image)).await;
    Ok(())
}
