// Shared fixtures for dispatcher/webhook tests. Everything runs against the in-memory mock provider.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use nimbus_bot::chat::{ChatSink, Reply, ReplyKind};
use nimbus_bot::dispatcher::Dispatcher;
use nimbus_bot::provider_manager::ClientFactory;
use nimbus_bot::settings::ComputeSettings;
use nimbus_common::{Flavor, Image, Server, ServerStatus};
use nimbus_providers::mock::MockProvider;
use nimbus_providers::ComputeProvider;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collects replies in order.
#[derive(Default)]
pub struct ReplyBuffer {
    replies: Mutex<Vec<Reply>>,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take(&self) -> Vec<Reply> {
        std::mem::take(&mut *self.replies.lock().await)
    }

    pub async fn texts(&self) -> Vec<String> {
        self.replies
            .lock()
            .await
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatSink for ReplyBuffer {
    async fn send(&self, text: String) {
        self.replies.lock().await.push(Reply {
            kind: ReplyKind::Send,
            text,
        });
    }

    async fn reply(&self, text: String) {
        self.replies.lock().await.push(Reply {
            kind: ReplyKind::Reply,
            text,
        });
    }
}

/// Hands out clones of one mock and counts how many clients were built.
pub struct MockFactory {
    pub mock: MockProvider,
    pub builds: AtomicUsize,
}

impl ClientFactory for MockFactory {
    fn build(&self, _settings: &ComputeSettings) -> anyhow::Result<Box<dyn ComputeProvider>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.mock.clone()))
    }
}

pub fn complete_settings() -> ComputeSettings {
    ComputeSettings {
        provider: Some("mock".into()),
        username: Some("demo".into()),
        password: Some("secret".into()),
        auth_url: Some("http://keystone.test:5000".into()),
        ..Default::default()
    }
}

pub fn dispatcher_with(mock: MockProvider, settings: ComputeSettings) -> (Dispatcher, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory {
        mock,
        builds: AtomicUsize::new(0),
    });
    let dispatcher = Dispatcher::new(Arc::new(settings), factory.clone(), "hubot");
    (dispatcher, factory)
}

pub fn flavor(id: &str, name: &str, ram: u64, disk: u64, vcpus: u32, swap: u64) -> Flavor {
    Flavor {
        id: id.into(),
        name: name.into(),
        ram,
        disk,
        vcpus,
        swap,
    }
}

pub fn image(id: &str, name: &str) -> Image {
    Image {
        id: id.into(),
        name: name.into(),
        created: Utc::now() - Duration::days(2),
    }
}

pub fn server(id: &str, name: &str) -> Server {
    Server {
        id: id.into(),
        name: name.into(),
        private_addresses: vec!["10.0.0.7".into()],
        status: ServerStatus::Running,
        key_name: Some("ops".into()),
        tenant_id: "tenant-1".into(),
        created: Utc::now() - Duration::hours(3),
    }
}
