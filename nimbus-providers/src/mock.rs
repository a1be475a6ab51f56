use crate::ComputeProvider;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use nimbus_common::{Flavor, Image, Server, ServerCreateRequest, ServerStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory compute provider.
///
/// Clones share state, so a test can keep one handle for assertions while the
/// dispatcher builds "new" clients from another. Every trait call is recorded
/// in [`MockProvider::calls`].
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    flavors: Vec<Flavor>,
    images: Vec<Image>,
    servers: Vec<Server>,
    /// Polls left before a freshly created server settles, and the status it settles in.
    pending: HashMap<String, (u32, ServerStatus)>,
    boot_polls: u32,
    boot_outcome: Option<ServerStatus>,
    failure: Option<String>,
    calls: Vec<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalog for running the bot without a cloud.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let state = MockState {
            flavors: vec![
                Flavor {
                    id: "1".into(),
                    name: "m1.tiny".into(),
                    ram: 512,
                    disk: 1,
                    vcpus: 1,
                    swap: 0,
                },
                Flavor {
                    id: "2".into(),
                    name: "m1.small".into(),
                    ram: 2048,
                    disk: 20,
                    vcpus: 1,
                    swap: 0,
                },
            ],
            images: vec![Image {
                id: uuid::Uuid::new_v4().to_string(),
                name: "cirros-0.6.2".into(),
                created: now - Duration::days(3),
            }],
            boot_polls: 2,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn with_flavors(self, flavors: Vec<Flavor>) -> Self {
        self.state.lock().await.flavors = flavors;
        self
    }

    pub async fn with_images(self, images: Vec<Image>) -> Self {
        self.state.lock().await.images = images;
        self
    }

    pub async fn with_servers(self, servers: Vec<Server>) -> Self {
        self.state.lock().await.servers = servers;
        self
    }

    /// Number of `get_server` polls a created server stays PROVISIONING,
    /// and the status it reaches afterwards (RUNNING unless overridden).
    pub async fn booting(self, polls: u32, outcome: ServerStatus) -> Self {
        {
            let mut state = self.state.lock().await;
            state.boot_polls = polls;
            state.boot_outcome = Some(outcome);
        }
        self
    }

    /// Makes every subsequent call fail with `message`.
    pub async fn failing(self, message: &str) -> Self {
        self.state.lock().await.failure = Some(message.to_string());
        self
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn servers(&self) -> Vec<Server> {
        self.state.lock().await.servers.clone()
    }

    async fn enter(&self, call: String) -> Result<tokio::sync::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().await;
        tracing::debug!("🧪 [Mock] {}", call);
        state.calls.push(call);
        if let Some(message) = state.failure.clone() {
            return Err(anyhow!(message));
        }
        Ok(state)
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    fn code(&self) -> &'static str {
        "mock"
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let state = self.enter("list_flavors".into()).await?;
        Ok(state.flavors.clone())
    }

    async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor> {
        let state = self.enter(format!("get_flavor {}", flavor_id)).await?;
        state
            .flavors
            .iter()
            .find(|f| f.id == flavor_id)
            .cloned()
            .ok_or_else(|| anyhow!("Flavor {} could not be found.", flavor_id))
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let state = self.enter("list_servers".into()).await?;
        Ok(state.servers.clone())
    }

    async fn get_server(&self, server_id: &str) -> Result<Server> {
        let mut state = self.enter(format!("get_server {}", server_id)).await?;

        let settled = match state.pending.get_mut(server_id) {
            Some((0, outcome)) => Some(*outcome),
            Some((left, _)) => {
                *left -= 1;
                None
            }
            None => None,
        };
        if let Some(outcome) = settled {
            state.pending.remove(server_id);
            if let Some(server) = state.servers.iter_mut().find(|s| s.id == server_id) {
                server.status = outcome;
            }
        }

        state
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .cloned()
            .ok_or_else(|| anyhow!("Instance {} could not be found.", server_id))
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Server> {
        let mut state = self.enter(format!("create_server {}", request.name)).await?;
        let server = Server {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.clone(),
            private_addresses: vec![format!("10.0.0.{}", state.servers.len() + 2)],
            status: ServerStatus::Provisioning,
            key_name: Some(request.key_name.clone()),
            tenant_id: "mock-tenant".into(),
            created: Utc::now(),
        };
        let outcome = state.boot_outcome.unwrap_or(ServerStatus::Running);
        let polls = state.boot_polls;
        state.pending.insert(server.id.clone(), (polls, outcome));
        state.servers.push(server.clone());
        Ok(server)
    }

    async fn destroy_server(&self, server_id: &str) -> Result<String> {
        let mut state = self.enter(format!("destroy_server {}", server_id)).await?;
        let before = state.servers.len();
        state.servers.retain(|s| s.id != server_id);
        if state.servers.len() == before {
            return Err(anyhow!("Instance {} could not be found.", server_id));
        }
        state.pending.remove(server_id);
        Ok(server_id.to_string())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let state = self.enter("list_images".into()).await?;
        Ok(state.images.clone())
    }

    async fn get_image(&self, image_id: &str) -> Result<Image> {
        let state = self.enter(format!("get_image {}", image_id)).await?;
        state
            .images
            .iter()
            .find(|i| i.id == image_id)
            .cloned()
            .ok_or_else(|| anyhow!("Image {} could not be found.", image_id))
    }
}
