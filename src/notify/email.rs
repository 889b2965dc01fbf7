use super::{Channel, Message, MessageFormat, SEND_TIMEOUT};
use anyhow::{self, Context};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

const SENDER_NAME: &str = "AnyRouter Assistant";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub user: String,
    pub password: String,
    /// One address or a comma-separated list.
    pub to: String,
}

impl EmailConfig {
    /// `smtp.<domain>` of the sending account.
    pub fn smtp_host(&self) -> anyhow::Result<String> {
        let (_, domain) = self
            .user
            .split_once('@')
            .filter(|(_, domain)| !domain.is_empty())
            .with_context(|| format!("Invalid sender address: {}", self.user))?;
        Ok(format!("smtp.{}", domain))
    }

    fn is_complete(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty() && !self.to.is_empty()
    }
}

pub struct EmailChannel {
    config: Option<EmailConfig>,
}

impl EmailChannel {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }
}

pub(crate) fn build_message(
    config: &EmailConfig,
    message: &Message<'_>,
) -> anyhow::Result<lettre::Message> {
    let from: Mailbox = format!("{} <{}>", SENDER_NAME, config.user)
        .parse()
        .with_context(|| format!("Invalid sender address: {}", config.user))?;

    let mut builder = lettre::Message::builder().from(from).subject(message.title);
    for addr in config.to.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        let to: Mailbox = addr
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", addr))?;
        builder = builder.to(to);
    }

    let content_type = match message.format {
        MessageFormat::Html => ContentType::TEXT_HTML,
        MessageFormat::Text => ContentType::TEXT_PLAIN,
    };
    builder
        .header(content_type)
        .body(message.content.to_string())
        .context("Failed to build email")
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        "Email"
    }

    fn is_configured(&self) -> bool {
        self.config.as_ref().is_some_and(EmailConfig::is_complete)
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let config = self.config.as_ref().context("Email settings missing")?;
        let email = build_message(config, message)?;

        // 465 端口，隐式 TLS
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host()?)?
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SEND_TIMEOUT))
            .build();

        transport.send(email).await.context("SMTP send failed")?;
        Ok(())
    }
}
