use crate::actions::{self, ActionResult, WaitPolicy};
use crate::chat::ChatSink;
use crate::commands::{self, Command, Parsed, PREFIX};
use crate::provider_manager::ClientFactory;
use crate::settings::ComputeSettings;
use nimbus_providers::ComputeProvider;
use std::sync::Arc;
use std::time::Instant;

/// Routes chat lines to command handlers.
///
/// Each command runs as validate -> build client -> remote call(s) -> reply, and
/// every failure is turned into a chat reply here, in one place.
pub struct Dispatcher {
    settings: Arc<ComputeSettings>,
    factory: Arc<dyn ClientFactory>,
    bot_name: String,
}

impl Dispatcher {
    pub fn new(settings: Arc<ComputeSettings>, factory: Arc<dyn ClientFactory>, bot_name: &str) -> Self {
        Self {
            settings,
            factory,
            bot_name: bot_name.to_string(),
        }
    }

    /// Whether a chat line is addressed to this module at all.
    pub fn accepts(&self, text: &str) -> bool {
        !matches!(commands::parse(text, &self.bot_name), Parsed::Ignored)
    }

    /// Handles one chat line. Returns false when the line was not addressed to this module.
    pub async fn handle_message(&self, text: &str, chat: &dyn ChatSink) -> bool {
        match commands::parse(text, &self.bot_name) {
            Parsed::Ignored => false,
            Parsed::Command(command) => {
                self.execute(command, chat).await;
                true
            }
            Parsed::Usage(usage) => {
                chat.reply(format!("Usage: {} {}", PREFIX, usage)).await;
                true
            }
            Parsed::Unknown(keyword) => {
                chat.reply(format!(
                    "Unknown command '{}'. Try: {} help",
                    keyword, PREFIX
                ))
                .await;
                true
            }
        }
    }

    pub async fn execute(&self, command: Command, chat: &dyn ChatSink) {
        if !command.is_remote() {
            chat.reply(commands::help_text()).await;
            return;
        }

        let messages = self.settings.validation_messages();
        if !messages.is_empty() {
            tracing::warn!(
                "⚠️ {} refused: missing settings {:?}",
                command.keyword(),
                self.settings.missing_required()
            );
            for message in messages {
                chat.send(message).await;
            }
            return;
        }

        let client = match self.factory.build(&self.settings) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("❌ could not build compute client: {:#}", e);
                chat.reply(e.to_string()).await;
                return;
            }
        };

        let keyword = command.keyword();
        let start = Instant::now();
        tracing::info!("📨 {} via provider={}", keyword, client.code());

        match self.run(client.as_ref(), command, chat).await {
            Ok(()) => tracing::info!(
                "✅ {} done in {}ms",
                keyword,
                start.elapsed().as_millis()
            ),
            Err(e) => {
                tracing::warn!(
                    "❌ {} failed after {}ms: {}",
                    keyword,
                    start.elapsed().as_millis(),
                    e
                );
                chat.reply(e.to_string()).await;
            }
        }
    }

    async fn run(&self, client: &dyn ComputeProvider, command: Command, chat: &dyn ChatSink) -> ActionResult {
        match command {
            Command::Flavors => actions::list_flavors(client, chat).await,
            Command::Flavor { id } => actions::show_flavor(client, chat, &id).await,
            Command::Servers { pattern } => {
                actions::list_servers(client, chat, pattern.as_deref()).await
            }
            Command::Server { id } => actions::show_server(client, chat, &id).await,
            Command::ServerCreate {
                name,
                flavor,
                image,
                key_name,
            } => {
                let wait = WaitPolicy {
                    interval: self.settings.wait_interval,
                    timeout: self.settings.wait_timeout,
                };
                actions::create_server(client, chat, &name, &flavor, &image, &key_name, wait).await
            }
            Command::ServerDelete { target } => actions::delete_server(client, chat, &target).await,
            Command::Images => actions::list_images(client, chat).await,
            Command::Image { id } => actions::show_image(client, chat, &id).await,
            Command::Help => {
                chat.reply(commands::help_text()).await;
                Ok(())
            }
        }
    }
}
