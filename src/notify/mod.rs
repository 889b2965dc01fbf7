//! Notification fanout.
//!
//! Every channel is tried once, in a fixed order. A channel without settings is
//! skipped silently; a failing channel is logged and never stops the others.

mod email;
mod webhook;

pub use email::{EmailChannel, EmailConfig};
pub use webhook::{DingTalkChannel, FeishuChannel, PushPlusChannel, ServerChanChannel, WeComChannel};

use anyhow::{self, Context};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// How the body should be rendered. Only email looks at this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub format: MessageFormat,
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    /// All required settings are present.
    fn is_configured(&self) -> bool;

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    NotConfigured,
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel: &'static str,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub channels: Vec<ChannelReport>,
}

impl FanoutReport {
    pub fn sent(&self) -> usize {
        self.count(|d| matches!(d, Delivery::Sent))
    }

    pub fn failed(&self) -> usize {
        self.count(|d| matches!(d, Delivery::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Delivery) -> bool) -> usize {
        self.channels.iter().filter(|c| pred(&c.delivery)).count()
    }
}

/// Settings for every channel. A channel whose settings are absent is skipped.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub email: Option<EmailConfig>,
    pub pushplus_token: Option<String>,
    pub serverchan_key: Option<String>,
    pub dingtalk_webhook: Option<String>,
    pub feishu_webhook: Option<String>,
    pub wecom_webhook: Option<String>,
}

pub struct Notifier {
    channels: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    /// Builds the standard channel set: email, PushPlus, ServerChan, DingTalk,
    /// Feishu, WeCom.
    pub fn from_config(config: &NotifyConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .context("Failed to build notification HTTP client")?;

        let channels: Vec<Box<dyn Channel>> = vec![
            Box::new(EmailChannel::new(config.email.clone())),
            Box::new(PushPlusChannel::new(
                client.clone(),
                config.pushplus_token.clone(),
            )),
            Box::new(ServerChanChannel::new(
                client.clone(),
                config.serverchan_key.clone(),
            )),
            Box::new(DingTalkChannel::new(
                client.clone(),
                config.dingtalk_webhook.clone(),
            )),
            Box::new(FeishuChannel::new(
                client.clone(),
                config.feishu_webhook.clone(),
            )),
            Box::new(WeComChannel::new(client, config.wecom_webhook.clone())),
        ];
        Ok(Self::new(channels))
    }

    pub async fn push_message(
        &self,
        title: &str,
        content: &str,
        format: MessageFormat,
    ) -> FanoutReport {
        let message = Message {
            title,
            content,
            format,
        };

        let mut report = FanoutReport::default();
        for channel in &self.channels {
            let delivery = if !channel.is_configured() {
                Delivery::NotConfigured
            } else {
                match channel.send(&message).await {
                    Ok(()) => {
                        info!("[{}]: message pushed successfully!", channel.name());
                        Delivery::Sent
                    }
                    Err(e) => {
                        warn!("[{}]: message push failed! reason: {:#}", channel.name(), e);
                        Delivery::Failed(format!("{:#}", e))
                    }
                }
            };
            report.channels.push(ChannelReport {
                channel: channel.name(),
                delivery,
            });
        }
        report
    }
}
