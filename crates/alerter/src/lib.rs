use crate::error::AlerterError;
use configuration::TelegramConfig;
use events::{EngineEvent, Severity};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;

pub mod error;

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the
    /// configuration, allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::Api(error_text));
        }

        Ok(())
    }
}

/// A long-running service that listens to the engine's event broadcast
/// and delivers Telegram notifications.
///
/// Delivery is best-effort: send failures are logged and dropped, never
/// propagated back into the trading loop.
pub async fn run_alerter_service(
    alerter: TelegramAlerter,
    mut event_rx: broadcast::Receiver<EngineEvent>,
) {
    tracing::info!("Alerter service started. Listening for engine events.");

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(msg) = format_event(&event) {
                    if let Err(e) = alerter.send_message(&msg).await {
                        tracing::error!(error = ?e, "Failed to send Telegram alert.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} messages.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event channel closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// Renders an event as a MarkdownV2 message, or `None` for events that
/// do not warrant a notification.
fn format_event(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::Started { symbol, balance } => Some(format!(
            "✅ *Engine started* on {} \\(balance {}\\)",
            escape_markdown(symbol),
            escape_markdown(&balance.to_string())
        )),
        EngineEvent::SignalRejected { signal, reason } => Some(format!(
            "⚠️ *Signal rejected* at {}: {}",
            escape_markdown(&signal.zone.price.to_string()),
            escape_markdown(reason)
        )),
        EngineEvent::OrderPlaced { position } => {
            let icon = icon_for_side(&format!("{:?}", position.side));
            Some(format!(
                "{} *Order placed* {:?} {} `@{}` stop `{}`",
                icon,
                position.side,
                escape_markdown(&position.symbol),
                escape_markdown(&position.entry_price.to_string()),
                escape_markdown(&position.stop_loss.to_string())
            ))
        }
        EngineEvent::PositionOpened { position } => Some(format!(
            "📍 *Position open* {:?} {} lots {}",
            position.side,
            escape_markdown(&position.size.to_string()),
            escape_markdown(&position.symbol)
        )),
        EngineEvent::PositionClosed {
            position,
            reason,
            exit_price,
            pnl,
        } => Some(format!(
            "🏁 *Closed* {} \\({:?}\\) exit `{}` P\\&L `{}`",
            escape_markdown(&position.symbol),
            reason,
            escape_markdown(&exit_price.to_string()),
            escape_markdown(&pnl.to_string())
        )),
        EngineEvent::DailySummary {
            day,
            trades,
            realized_loss,
            balance,
        } => Some(format!(
            "🗓 *Daily summary* {}: {} trades, loss `{}`, balance `{}`",
            escape_markdown(day),
            trades,
            escape_markdown(&realized_loss.to_string()),
            escape_markdown(&balance.to_string())
        )),
        EngineEvent::Alert {
            severity, message, ..
        } => {
            let title = match severity {
                Severity::Critical => "🚨 CRITICAL",
                Severity::Warning => "⚠️ WARNING",
                Severity::Info => "ℹ️",
            };
            Some(format!("*{}*: {}", title, escape_markdown(message)))
        }
    }
}

fn icon_for_side(side: &str) -> &'static str {
    if side.eq_ignore_ascii_case("buy") {
        "📈"
    } else {
        "📉"
    }
}

/// Escapes characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}
