//! Alert delivery.
//!
//! Lock and mistake notifications fan out over a Redis pub/sub channel
//! for in-app consumers plus optional Telegram and Discord pushes.
//! Delivery is best effort everywhere: a dead webhook never blocks or
//! fails a risk evaluation.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use prop_core::config::AlertsConfig;

/// Redis pub/sub channel names.
pub mod channels {
    /// Lock and mistake alerts for account owners.
    pub const RISK_ALERTS: &str = "risk:alerts";
}

const OUTBOX_CAPACITY: usize = 10_000;

/// What triggered the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DailyLossLock,
    ProfitTargetLock,
    ManualLock,
    MistakeDetected,
}

/// One notification to the account owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
}

/// Outbound alert sink.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(&self, account_id: Uuid, message: &AlertMessage) -> anyhow::Result<()>;
}

/// Production dispatcher: Redis pub/sub plus optional Telegram and
/// Discord pushes.
///
/// The Redis leg is the one consumers depend on, so its failure is the
/// call's failure. The chat legs only fire when configured and only
/// ever log a warning when they break.
pub struct PushAlerter {
    redis: ConnectionManager,
    http: reqwest::Client,
    config: AlertsConfig,
}

impl PushAlerter {
    pub async fn new(redis_url: &str, config: AlertsConfig) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self {
            redis,
            http: reqwest::Client::new(),
            config,
        })
    }

    async fn publish_redis(&self, account_id: Uuid, message: &AlertMessage) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&serde_json::json!({
            "account_id": account_id,
            "kind": message.kind,
            "title": message.title,
            "body": message.body,
        }))?;

        let mut conn = self.redis.clone();
        let _: () = conn.publish(channels::RISK_ALERTS, payload).await?;
        Ok(())
    }

    async fn send_telegram(&self, token: &str, chat_id: &str, text: &str) -> anyhow::Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        self.http
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_discord(&self, webhook_url: &str, text: &str) -> anyhow::Result<()> {
        let body = serde_json::json!({ "content": text });

        self.http
            .post(webhook_url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn emoji(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::DailyLossLock => "🚨",
        AlertKind::ProfitTargetLock => "🎯",
        AlertKind::ManualLock => "🔒",
        AlertKind::MistakeDetected => "⚠️",
    }
}

#[async_trait]
impl AlertDispatcher for PushAlerter {
    async fn notify(&self, account_id: Uuid, message: &AlertMessage) -> anyhow::Result<()> {
        self.publish_redis(account_id, message).await?;

        if let (Some(token), Some(chat_id)) = (
            &self.config.telegram_bot_token,
            &self.config.telegram_chat_id,
        ) {
            let text = format!(
                "{} <b>{}</b>\n{}",
                emoji(message.kind),
                message.title,
                message.body
            );
            if let Err(e) = self.send_telegram(token, chat_id, &text).await {
                warn!("Failed to send Telegram alert: {}", e);
            }
        }

        if let Some(webhook_url) = &self.config.discord_webhook_url {
            let text = format!(
                "{} **{}**\n{}",
                emoji(message.kind),
                message.title,
                message.body
            );
            if let Err(e) = self.send_discord(webhook_url, &text).await {
                warn!("Failed to send Discord alert: {}", e);
            }
        }

        debug!(%account_id, kind = ?message.kind, "Published risk alert");
        Ok(())
    }
}

/// Test dispatcher that records every alert it is handed.
#[derive(Default)]
pub struct RecordingAlerter {
    sent: RwLock<Vec<(Uuid, AlertMessage)>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(Uuid, AlertMessage)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingAlerter {
    async fn notify(&self, account_id: Uuid, message: &AlertMessage) -> anyhow::Result<()> {
        self.sent.write().await.push((account_id, message.clone()));
        Ok(())
    }
}

/// Bounded queue decoupling risk evaluation from alert delivery.
///
/// Evaluations enqueue and move on; a background task drains the queue
/// into the dispatcher. When the queue is full the alert is dropped
/// with a warning rather than applying backpressure to the breaker.
#[derive(Clone)]
pub struct AlertOutbox {
    tx: mpsc::Sender<(Uuid, AlertMessage)>,
}

impl AlertOutbox {
    pub fn new(dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        let (tx, mut rx) = mpsc::channel::<(Uuid, AlertMessage)>(OUTBOX_CAPACITY);

        tokio::spawn(async move {
            while let Some((account_id, message)) = rx.recv().await {
                if let Err(e) = dispatcher.notify(account_id, &message).await {
                    warn!(
                        "Failed to deliver {:?} alert for account {}: {}",
                        message.kind, account_id, e
                    );
                }
            }
        });

        Self { tx }
    }

    /// Queue an alert for delivery. Never blocks.
    pub fn enqueue(&self, account_id: Uuid, message: AlertMessage) {
        if let Err(e) = self.tx.try_send((account_id, message)) {
            warn!("Alert outbox full, dropping alert: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> AlertMessage {
        AlertMessage {
            kind: AlertKind::DailyLossLock,
            title: "Daily loss breaker tripped".to_string(),
            body: "Account locked".to_string(),
        }
    }

    #[tokio::test]
    async fn test_outbox_delivers_to_dispatcher() {
        let recorder = Arc::new(RecordingAlerter::new());
        let outbox = AlertOutbox::new(recorder.clone());
        let account_id = Uuid::new_v4();

        outbox.enqueue(account_id, message());

        // The drain task runs on the same runtime; give it a beat.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let sent = recorder.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, account_id);
        assert_eq!(sent[0].1.kind, AlertKind::DailyLossLock);
    }

    #[test]
    fn test_alert_kind_serializes_snake_case() {
        let json = serde_json::to_string(&AlertKind::MistakeDetected).unwrap();
        assert_eq!(json, "\"mistake_detected\"");
    }
}
