//! Best-effort Telegram and Discord notifications.
//!
//! Both channels are optional. Delivery failures are logged and dropped;
//! nothing in the scan or execution path ever waits on a webhook.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use crate::types::{ExecutionRecord, Opportunity};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT_SECS: u64 = 10;

pub struct Notifier {
    client: reqwest::Client,
    telegram: Option<TelegramTarget>,
    discord_webhook: Option<String>,
}

struct TelegramTarget {
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(
        telegram_bot_token: Option<String>,
        telegram_chat_id: Option<String>,
        discord_webhook: Option<String>,
    ) -> Self {
        let telegram = match (telegram_bot_token, telegram_chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramTarget { bot_token, chat_id }),
            _ => None,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            telegram,
            discord_webhook,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.telegram.is_some() || self.discord_webhook.is_some()
    }

    pub async fn notify_opportunity(&self, opp: &Opportunity) {
        let text = format!(
            "💰 <b>Arbitrage opportunity</b>\n\
             Pair: {}\n\
             Buy: {} @ {}\n\
             Sell: {} @ {}\n\
             Net profit: {:.4}% (${:.2})\n\
             Gas: ${:.4}",
            opp.pair_label(),
            opp.buy_venue,
            opp.buy_price,
            opp.sell_venue,
            opp.sell_price,
            opp.profit_pct,
            opp.profit_usd,
            opp.gas_cost_usd
        );
        self.send_all(&text).await;
    }

    pub async fn notify_execution(&self, record: &ExecutionRecord) {
        let icon = match record.status.as_str() {
            "confirmed" => "✅",
            "dry_run" => "📝",
            _ => "❌",
        };
        let text = format!(
            "{} <b>Execution {}</b>\n\
             Pair: {}/{}\n\
             {} -> {}\n\
             Profit: ${:.2}\n\
             Tx: {}",
            icon,
            record.status,
            record.token_in,
            record.token_out,
            record.buy_venue,
            record.sell_venue,
            record.profit_usd,
            record.tx_hash.as_deref().unwrap_or("-")
        );
        self.send_all(&text).await;
    }

    pub async fn notify_error(&self, message: &str) {
        self.send_all(&format!("🚨 <b>Error</b>\n{}", message)).await;
    }

    pub async fn notify_status(&self, message: &str) {
        self.send_all(&format!("ℹ️ {}", message)).await;
    }

    async fn send_all(&self, text: &str) {
        if let Some(tg) = &self.telegram {
            if let Err(e) = self.send_telegram(tg, text).await {
                warn!("telegram notification failed: {}", e);
            }
        }
        if let Some(url) = &self.discord_webhook {
            if let Err(e) = self.send_discord(url, text).await {
                warn!("discord notification failed: {}", e);
            }
        }
    }

    async fn send_telegram(&self, tg: &TelegramTarget, text: &str) -> reqwest::Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", tg.bot_token);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": tg.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;
        debug!("telegram sendMessage status {}", resp.status());
        Ok(())
    }

    async fn send_discord(&self, webhook: &str, text: &str) -> reqwest::Result<()> {
        // Discord has no HTML mode; strip the tags Telegram uses
        let plain = text.replace("<b>", "**").replace("</b>", "**");
        let resp = self
            .client
            .post(webhook)
            .json(&json!({ "content": plain }))
            .send()
            .await?;
        debug!("discord webhook status {}", resp.status());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_targets() {
        let n = Notifier::new(None, None, None);
        assert!(!n.is_enabled());
        // telegram needs both token and chat id
        let n = Notifier::new(Some("t".into()), None, None);
        assert!(!n.is_enabled());
        let n = Notifier::new(Some("t".into()), Some("c".into()), None);
        assert!(n.is_enabled());
    }
}
