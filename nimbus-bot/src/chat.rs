use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    /// Posted to the room.
    Send,
    /// Addressed to the user who issued the command.
    Reply,
}

impl ReplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyKind::Send => "send",
            ReplyKind::Reply => "reply",
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
}

/// Where command output goes. Implemented by each chat host.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, text: String);
    async fn reply(&self, text: String);
}

/// Forwards each reply the moment it is produced; used by the HTTP hook.
pub struct ChannelSink {
    tx: mpsc::Sender<Reply>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Reply>) -> Self {
        Self { tx }
    }

    async fn push(&self, kind: ReplyKind, text: String) {
        // The caller may hang up mid-command; the command still runs to completion.
        if self.tx.send(Reply { kind, text }).await.is_err() {
            tracing::debug!("💬 reply dropped, hook caller disconnected");
        }
    }
}

#[async_trait]
impl ChatSink for ChannelSink {
    async fn send(&self, text: String) {
        self.push(ReplyKind::Send, text).await;
    }

    async fn reply(&self, text: String) {
        self.push(ReplyKind::Reply, text).await;
    }
}

/// Prints to stdout; `reply` is prefixed with the user's name like a chat client would.
pub struct ConsoleSink {
    pub user: String,
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn send(&self, text: String) {
        println!("{}", text.trim_end_matches('\n'));
    }

    async fn reply(&self, text: String) {
        println!("{}: {}", self.user, text.trim_end_matches('\n'));
    }
}
