//! Telegram bot handlers.

use crate::broadcast::MessageSender;
use crate::db::Database;
use crate::formatter::RateFormatter;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use teloxide::utils::html::escape;
use thiserror::Error;
use tipocambio_core::compare;
use tipocambio_feeds::RateAggregator;
use tracing::{error, info, warn};

const LOADING_TEXT: &str = "📊 Obteniendo tasas de cambio...";
const RATES_APOLOGY: &str = "❌ Error al obtener las tasas de cambio. Intenta más tarde.";
const GENERIC_APOLOGY: &str = "❌ Ocurrió un error. Intenta de nuevo más tarde.";

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Database error: {0}")]
    Db(#[from] crate::db::DbError),
}

/// Bot commands.
#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Comandos disponibles:")]
pub enum Command {
    #[command(description = "Iniciar el bot")]
    Start,
    #[command(description = "Mostrar esta ayuda")]
    Help,
    #[command(description = "Verificar que el bot responde")]
    Ping,
    #[command(description = "Ver el tipo de cambio actual")]
    Rates,
    #[command(description = "Recibir el tipo de cambio cada mañana")]
    Subscribe,
    #[command(description = "Dejar de recibir la notificación diaria")]
    Unsubscribe,
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
    db: Database,
    aggregator: RateAggregator,
    formatter: RateFormatter,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(
        token: &str,
        db: Database,
        aggregator: RateAggregator,
        formatter: RateFormatter,
    ) -> Self {
        let bot = Bot::new(token);
        Self {
            bot,
            db,
            aggregator,
            formatter,
        }
    }

    /// Run the long-polling command dispatcher until Ctrl-C.
    pub async fn run(self: Arc<Self>) {
        let bot = self.bot.clone();

        if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let handler = Update::filter_message().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let this = Arc::clone(&self);
                async move { this.handle_command(bot, msg, cmd).await }
            },
        );

        info!("Telegram bot polling for updates");
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_command(
        &self,
        bot: Bot,
        msg: Message,
        cmd: Command,
    ) -> Result<(), TelegramError> {
        let chat_id = msg.chat.id;

        match cmd {
            Command::Start => {
                let name = msg.chat.first_name().unwrap_or("Usuario");
                bot.send_message(chat_id, start_text(name))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }

            Command::Help => {
                bot.send_message(chat_id, Command::descriptions().to_string())
                    .await?;
            }

            Command::Ping => {
                bot.send_message(chat_id, "🏓 ¡Pong! El bot está funcionando.")
                    .await?;
            }

            Command::Rates => {
                let loading = bot.send_message(chat_id, LOADING_TEXT).await?;

                let snapshot = self.aggregator.aggregate().await;
                let comparison = compare(&snapshot);
                let text = self.formatter.format_rates(&snapshot, &comparison);

                let edited = bot
                    .edit_message_text(chat_id, loading.id, text)
                    .parse_mode(ParseMode::Html)
                    .await;
                if let Err(e) = edited {
                    error!(chat_id = chat_id.0, error = %e, "Failed to deliver rates");
                    bot.edit_message_text(chat_id, loading.id, RATES_APOLOGY)
                        .await?;
                }
            }

            Command::Subscribe => {
                let reply = match self.db.add_subscriber(chat_id.0).await {
                    Ok(_) => {
                        info!(chat_id = chat_id.0, "Chat subscribed to daily notifications");
                        "✅ ¡Suscripción activada! Recibirás el tipo de cambio cada mañana.\n\
                         Usa /unsubscribe para cancelarla."
                    }
                    Err(e) => {
                        error!(chat_id = chat_id.0, error = %e, "Failed to subscribe chat");
                        GENERIC_APOLOGY
                    }
                };
                bot.send_message(chat_id, reply).await?;
            }

            Command::Unsubscribe => {
                let reply = match self.db.remove_subscriber(chat_id.0).await {
                    Ok(true) => {
                        info!(chat_id = chat_id.0, "Chat unsubscribed from daily notifications");
                        "✅ Suscripción cancelada. Ya no recibirás la notificación diaria."
                    }
                    Ok(false) => "ℹ️ No estabas suscrito. Usa /subscribe para suscribirte.",
                    Err(e) => {
                        error!(chat_id = chat_id.0, error = %e, "Failed to unsubscribe chat");
                        GENERIC_APOLOGY
                    }
                };
                bot.send_message(chat_id, reply).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MessageSender for TelegramBot {
    type Error = TelegramError;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

fn start_text(name: &str) -> String {
    format!(
        "👋 ¡Hola, <b>{}</b>!\n\n\
         Te muestro el tipo de cambio de compra de dólares (USD → GTQ) \
         del Banguat, Banrural y Nexa Banco.\n\n\
         /rates - Ver el tipo de cambio actual\n\
         /subscribe - Recibirlo cada mañana\n\
         /help - Ver todos los comandos",
        escape(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/rates", "tipocambio_bot").unwrap(), Command::Rates);
        assert_eq!(
            Command::parse("/subscribe@tipocambio_bot", "tipocambio_bot").unwrap(),
            Command::Subscribe
        );
        assert!(Command::parse("/premium 50", "tipocambio_bot").is_err());
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = Command::descriptions().to_string();
        for cmd in ["/start", "/help", "/ping", "/rates", "/subscribe", "/unsubscribe"] {
            assert!(help.contains(cmd), "missing {cmd}");
        }
    }

    #[test]
    fn test_start_text_escapes_name() {
        let text = start_text("<Ana>");
        assert!(text.contains("<b>&lt;Ana&gt;</b>"));
    }
}
