use anyhow::Context;
use nimbus_bot::chat::ConsoleSink;
use nimbus_bot::dispatcher::Dispatcher;
use nimbus_bot::provider_manager::ProviderManager;
use nimbus_bot::routes::{create_router, AppState};
use nimbus_bot::settings::{ComputeSettings, HostMode, HostSettings};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Arc::new(ComputeSettings::from_env());
    let host = HostSettings::from_env();

    let missing = settings.missing_required();
    if !missing.is_empty() {
        // Not fatal: every command will explain what is missing.
        tracing::warn!("⚠️ Compute settings incomplete, missing: {:?}", missing);
    }

    let dispatcher = Dispatcher::new(settings, Arc::new(ProviderManager::new()), &host.bot_name);

    match host.mode {
        HostMode::Console => run_console(dispatcher).await,
        HostMode::Http => {
            let state = Arc::new(AppState { dispatcher });
            let app = create_router(state);
            let listener = tokio::net::TcpListener::bind(host.listen_addr.as_str())
                .await
                .with_context(|| format!("cannot listen on {}", host.listen_addr))?;
            tracing::info!("Nimbus bot listening on {}", host.listen_addr);
            axum::serve(listener, app).await?;
            Ok(())
        }
    }
}

async fn run_console(dispatcher: Dispatcher) -> anyhow::Result<()> {
    let user = std::env::var("USER").unwrap_or_else(|_| "operator".to_string());
    let sink = ConsoleSink { user };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!("Nimbus bot reading commands from stdin");
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if !dispatcher.handle_message(&line, &sink).await {
            tracing::debug!("ignored: {}", line);
        }
    }
    Ok(())
}
