use crate::account::{cookie_header, CookieMap};
use anyhow::{self, Context};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://anyrouter.top";
pub const LOGIN_PATH: &str = "/login";
const USER_SELF_PATH: &str = "/api/user/self";
const SIGN_IN_PATH: &str = "/api/user/sign_in";

const API_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// 内部额度单位 -> 美元
const QUOTA_PER_DOLLAR: f64 = 500_000.0;
const ERROR_PREVIEW_CHARS: usize = 50;
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Outcome of one sign-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinOutcome {
    pub success: bool,
    pub user_info: Option<String>,
    pub error: Option<String>,
}

impl CheckinOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user_info: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UserSelfResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<UserData>,
}

#[derive(Debug, Default, Deserialize)]
struct UserData {
    #[serde(default)]
    quota: f64,
    #[serde(default)]
    used_quota: f64,
}

/// Truncates to at most `ERROR_PREVIEW_CHARS` characters.
pub fn error_preview(message: &str) -> String {
    message.chars().take(ERROR_PREVIEW_CHARS).collect()
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, LOGIN_PATH)
    }

    fn build_request_headers(
        &self,
        cookies: &CookieMap,
        api_user: &str,
        extra: &[(&'static str, &'static str)],
    ) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let common = [
            (
                HeaderName::from_static("user-agent"),
                HeaderValue::from_static(API_USER_AGENT),
            ),
            (
                HeaderName::from_static("accept"),
                HeaderValue::from_static("application/json, text/plain, */*"),
            ),
            (
                HeaderName::from_static("accept-language"),
                HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
            ),
            (
                HeaderName::from_static("connection"),
                HeaderValue::from_static("keep-alive"),
            ),
            (
                HeaderName::from_static("sec-fetch-dest"),
                HeaderValue::from_static("empty"),
            ),
            (
                HeaderName::from_static("sec-fetch-mode"),
                HeaderValue::from_static("cors"),
            ),
            (
                HeaderName::from_static("sec-fetch-site"),
                HeaderValue::from_static("same-origin"),
            ),
        ];
        for (name, value) in common {
            headers.insert(name, value);
        }

        headers.insert(
            HeaderName::from_static("referer"),
            HeaderValue::from_str(&format!("{}/console", self.base_url))?,
        );
        headers.insert(
            HeaderName::from_static("origin"),
            HeaderValue::from_str(&self.base_url)?,
        );

        for (name, value) in extra {
            headers.insert(HeaderName::from_str(name)?, HeaderValue::from_static(*value));
        }

        headers.insert(
            HeaderName::from_static("cookie"),
            HeaderValue::from_str(&cookie_header(cookies))
                .map_err(|_| anyhow::anyhow!("Invalid cookie value"))?,
        );
        headers.insert(
            HeaderName::from_static("new-api-user"),
            HeaderValue::from_str(api_user)
                .map_err(|_| anyhow::anyhow!("Invalid api user value: {}", api_user))?,
        );

        Ok(headers)
    }

    /// Reads the account balance. `None` when the service does not confirm the
    /// request; transport problems come back as a short failure line instead.
    pub async fn fetch_balance(&self, cookies: &CookieMap, api_user: &str) -> Option<String> {
        match self.try_fetch_balance(cookies, api_user).await {
            Ok(summary) => summary,
            Err(e) => Some(format!(
                "[FAIL] Failed to fetch user info: {}...",
                error_preview(&e.to_string())
            )),
        }
    }

    async fn try_fetch_balance(
        &self,
        cookies: &CookieMap,
        api_user: &str,
    ) -> anyhow::Result<Option<String>> {
        let headers = self.build_request_headers(cookies, api_user, &[])?;
        let res = self
            .client
            .get(format!("{}{}", self.base_url, USER_SELF_PATH))
            .headers(headers)
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            debug!("user info returned {}", res.status());
            return Ok(None);
        }
        let body = match res.json::<UserSelfResponse>().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to parse user info as JSON: {}", e);
                return Ok(None);
            }
        };
        if !body.success {
            return Ok(None);
        }

        let data = body.data.unwrap_or_default();
        let balance = data.quota / QUOTA_PER_DOLLAR;
        let used = data.used_quota / QUOTA_PER_DOLLAR;
        Ok(Some(format!(
            ":money: Current balance: ${:.2}, Used: ${:.2}",
            balance, used
        )))
    }

    /// Performs the daily sign-in. Service answers and transport failures become a
    /// failed outcome; `Err` means the request could not be built at all.
    pub async fn check_in(
        &self,
        account: &str,
        cookies: &CookieMap,
        api_user: &str,
    ) -> anyhow::Result<CheckinOutcome> {
        let headers = self.build_request_headers(
            cookies,
            api_user,
            &[
                ("content-type", "application/json"),
                ("x-requested-with", "XMLHttpRequest"),
            ],
        )?;

        info!("{}: performing check-in", account);
        let res = match self
            .client
            .post(format!("{}{}", self.base_url, SIGN_IN_PATH))
            .headers(headers)
            .body("{}")
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                let preview = error_preview(&e.to_string());
                warn!("{}: error during check-in - {}...", account, preview);
                return Ok(CheckinOutcome::failed(preview));
            }
        };

        let status = res.status();
        info!("{}: response status {}", account, status);
        if status != StatusCode::OK {
            warn!("{}: check-in failed - HTTP {}", account, status.as_u16());
            return Ok(CheckinOutcome::failed(format!("HTTP {}", status.as_u16())));
        }

        // 非 JSON 响应按没有任何成功标志处理
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        if !is_checkin_success(&body) {
            let msg = checkin_error_message(&body);
            warn!("{}: check-in failed - {}", account, msg);
            return Ok(CheckinOutcome::failed(msg));
        }

        info!("{}: check-in succeeded!", account);
        let user_info = self.fetch_balance(cookies, api_user).await;
        if let Some(info) = &user_info {
            info!("{}", info);
        }
        Ok(CheckinOutcome {
            success: true,
            user_info,
            error: None,
        })
    }
}

/// Any one of `ret == 1`, `code == 0` or `success == true` marks success.
pub fn is_checkin_success(body: &Value) -> bool {
    let ret_ok = body.get("ret").and_then(Value::as_f64) == Some(1.0);
    let code_ok = body.get("code").and_then(Value::as_f64) == Some(0.0);
    let success_ok = body.get("success").and_then(Value::as_bool) == Some(true);
    ret_ok || code_ok || success_ok
}

pub fn checkin_error_message(body: &Value) -> String {
    ["msg", "message"]
        .into_iter()
        .filter_map(|key| body.get(key).and_then(Value::as_str))
        .find(|msg| !msg.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}
