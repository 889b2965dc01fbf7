use crate::account::AccountConfig;
use crate::notify::{EmailConfig, NotifyConfig};
use crate::waf::BrowserSettings;
use std::path::PathBuf;
use thiserror::Error;

pub const ACCOUNTS_VAR: &str = "ANYROUTER_ACCOUNTS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ANYROUTER_ACCOUNTS environment variable not found")]
    MissingAccounts,
    #[error("account configuration must be a JSON array [{{}}]")]
    NotAnArray,
    #[error("account configuration format is invalid: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Everything a run needs, built once from the environment.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub accounts: Vec<AccountConfig>,
    pub notify: NotifyConfig,
    pub browser: BrowserSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let raw = get(ACCOUNTS_VAR).ok_or(ConfigError::MissingAccounts)?;
        Ok(Self {
            accounts: parse_accounts(&raw)?,
            notify: notify_config(&get),
            browser: browser_settings(&get),
        })
    }
}

/// Notification settings alone, for reporting errors when accounts failed to load.
pub fn notify_from_env() -> NotifyConfig {
    notify_config(&|key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
}

pub fn parse_accounts(raw: &str) -> Result<Vec<AccountConfig>, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_array() {
        return Err(ConfigError::NotAnArray);
    }
    Ok(serde_json::from_value(value)?)
}

fn notify_config(get: &dyn Fn(&str) -> Option<String>) -> NotifyConfig {
    let email = match (get("EMAIL_USER"), get("EMAIL_PASS"), get("EMAIL_TO")) {
        (Some(user), Some(password), Some(to)) => Some(EmailConfig { user, password, to }),
        _ => None,
    };
    NotifyConfig {
        email,
        pushplus_token: get("PUSHPLUS_TOKEN"),
        serverchan_key: get("SERVERPUSHKEY"),
        dingtalk_webhook: get("DINGDING_WEBHOOK"),
        feishu_webhook: get("FEISHU_WEBHOOK"),
        wecom_webhook: get("WEIXIN_WEBHOOK"),
    }
}

fn browser_settings(get: &dyn Fn(&str) -> Option<String>) -> BrowserSettings {
    let headless = get("CHECKIN_HEADLESS")
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
        .unwrap_or(true);
    BrowserSettings {
        headless,
        chrome_path: get("CHROME_PATH").map(PathBuf::from),
    }
}
