use super::{Channel, Message};
use anyhow::{self, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

const PUSHPLUS_URL: &str = "http://www.pushplus.plus/send";
const SERVERCHAN_BASE: &str = "https://sctapi.ftqq.com";

fn configured(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

async fn post_json(client: &Client, url: &str, payload: &Value) -> anyhow::Result<()> {
    client
        .post(url)
        .json(payload)
        .send()
        .await
        .context("request failed")?
        .error_for_status()?;
    Ok(())
}

/// DingTalk and WeCom robots share the same text payload.
fn text_payload(message: &Message<'_>) -> Value {
    json!({
        "msgtype": "text",
        "text": {
            "content": format!("{}\n{}", message.title, message.content)
        }
    })
}

pub struct PushPlusChannel {
    client: Client,
    token: Option<String>,
    endpoint: String,
}

impl PushPlusChannel {
    pub fn new(client: Client, token: Option<String>) -> Self {
        Self {
            client,
            token,
            endpoint: PUSHPLUS_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Channel for PushPlusChannel {
    fn name(&self) -> &'static str {
        "PushPlus"
    }

    fn is_configured(&self) -> bool {
        configured(&self.token).is_some()
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let token = configured(&self.token).context("PushPlus token missing")?;
        let payload = json!({
            "token": token,
            "title": message.title,
            "content": message.content,
            "template": "html",
        });
        post_json(&self.client, &self.endpoint, &payload).await
    }
}

pub struct ServerChanChannel {
    client: Client,
    key: Option<String>,
    base_url: String,
}

impl ServerChanChannel {
    pub fn new(client: Client, key: Option<String>) -> Self {
        Self {
            client,
            key,
            base_url: SERVERCHAN_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Channel for ServerChanChannel {
    fn name(&self) -> &'static str {
        "ServerChan"
    }

    fn is_configured(&self) -> bool {
        configured(&self.key).is_some()
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let key = configured(&self.key).context("ServerChan key missing")?;
        let url = format!("{}/{}.send", self.base_url, key);
        let payload = json!({
            "title": message.title,
            "desp": message.content,
        });
        post_json(&self.client, &url, &payload).await
    }
}

pub struct DingTalkChannel {
    client: Client,
    webhook: Option<String>,
}

impl DingTalkChannel {
    pub fn new(client: Client, webhook: Option<String>) -> Self {
        Self { client, webhook }
    }
}

#[async_trait]
impl Channel for DingTalkChannel {
    fn name(&self) -> &'static str {
        "DingTalk"
    }

    fn is_configured(&self) -> bool {
        configured(&self.webhook).is_some()
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let url = configured(&self.webhook).context("DingTalk webhook missing")?;
        post_json(&self.client, url, &text_payload(message)).await
    }
}

pub struct FeishuChannel {
    client: Client,
    webhook: Option<String>,
}

impl FeishuChannel {
    pub fn new(client: Client, webhook: Option<String>) -> Self {
        Self { client, webhook }
    }
}

#[async_trait]
impl Channel for FeishuChannel {
    fn name(&self) -> &'static str {
        "Feishu"
    }

    fn is_configured(&self) -> bool {
        configured(&self.webhook).is_some()
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let url = configured(&self.webhook).context("Feishu webhook missing")?;
        // 交互卡片：标题放 header，正文按 markdown 渲染
        let payload = json!({
            "msg_type": "interactive",
            "card": {
                "elements": [{
                    "tag": "markdown",
                    "content": message.content,
                    "text_align": "left",
                }],
                "header": {
                    "template": "blue",
                    "title": {
                        "content": message.title,
                        "tag": "plain_text",
                    },
                },
            },
        });
        post_json(&self.client, url, &payload).await
    }
}

pub struct WeComChannel {
    client: Client,
    webhook: Option<String>,
}

impl WeComChannel {
    pub fn new(client: Client, webhook: Option<String>) -> Self {
        Self { client, webhook }
    }
}

#[async_trait]
impl Channel for WeComChannel {
    fn name(&self) -> &'static str {
        "WeCom"
    }

    fn is_configured(&self) -> bool {
        configured(&self.webhook).is_some()
    }

    async fn send(&self, message: &Message<'_>) -> anyhow::Result<()> {
        let url = configured(&self.webhook).context("WeCom webhook missing")?;
        post_json(&self.client, url, &text_payload(message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MessageFormat;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const MESSAGE: Message<'static> = Message {
        title: "AnyRouter check-in result",
        content: "[SUCCESS] Account 1",
        format: MessageFormat::Html,
    };

    #[test]
    fn empty_settings_are_not_configured() {
        let client = Client::new();
        assert!(!DingTalkChannel::new(client.clone(), Some(String::new())).is_configured());
        assert!(!PushPlusChannel::new(client.clone(), None).is_configured());
        assert!(ServerChanChannel::new(client, Some("SCT1".into())).is_configured());
    }

    #[tokio::test]
    async fn pushplus_sends_html_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_json(json!({
                "token": "tok",
                "title": "AnyRouter check-in result",
                "content": "[SUCCESS] Account 1",
                "template": "html",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = PushPlusChannel::new(Client::new(), Some("tok".into()))
            .with_endpoint(format!("{}/send", server.uri()));
        channel.send(&MESSAGE).await.unwrap();
    }

    #[tokio::test]
    async fn serverchan_puts_key_in_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/SCTkey.send"))
            .and(body_json(json!({
                "title": "AnyRouter check-in result",
                "desp": "[SUCCESS] Account 1",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = ServerChanChannel::new(Client::new(), Some("SCTkey".into()))
            .with_base_url(server.uri());
        channel.send(&MESSAGE).await.unwrap();
    }

    #[tokio::test]
    async fn feishu_sends_interactive_card() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(json!({
                "msg_type": "interactive",
                "card": {
                    "elements": [{
                        "tag": "markdown",
                        "content": "[SUCCESS] Account 1",
                        "text_align": "left",
                    }],
                    "header": {
                        "template": "blue",
                        "title": {"content": "AnyRouter check-in result", "tag": "plain_text"},
                    },
                },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let channel = FeishuChannel::new(Client::new(), Some(format!("{}/hook", server.uri())));
        channel.send(&MESSAGE).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let channel = DingTalkChannel::new(Client::new(), Some(server.uri()));
        assert!(channel.send(&MESSAGE).await.is_err());
    }
}
