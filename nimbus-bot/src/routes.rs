use crate::chat::{ChannelSink, Reply};
use crate::dispatcher::Dispatcher;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub struct AppState {
    pub dispatcher: Dispatcher,
}

#[derive(Deserialize, Debug)]
pub struct ChatMessage {
    pub text: String,
    #[serde(default)]
    pub user: Option<String>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/hooks/chat", post(chat_hook))
        .with_state(state)
}

async fn root() -> &'static str {
    "Nimbus compute bot online"
}

/// Streams the replies of one chat line as server-sent events.
///
/// Each event is named after the reply kind (`send` or `reply`) and carries the
/// reply as JSON. Lines not addressed to the bot get `204 No Content`.
async fn chat_hook(State(state): State<Arc<AppState>>, Json(message): Json<ChatMessage>) -> Response {
    tracing::debug!(
        "💬 chat_hook: user={} text={}",
        message.user.as_deref().unwrap_or("anonymous"),
        message.text
    );
    if !state.dispatcher.accepts(&message.text) {
        return StatusCode::NO_CONTENT.into_response();
    }

    let (tx, rx) = tokio::sync::mpsc::channel::<Reply>(16);
    tokio::spawn(async move {
        let sink = ChannelSink::new(tx);
        state.dispatcher.handle_message(&message.text, &sink).await;
    });

    let events = ReceiverStream::new(rx)
        .map(|reply| Event::default().event(reply.kind.as_str()).json_data(&reply));
    Sse::new(events)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keepalive"),
        )
        .into_response()
}
