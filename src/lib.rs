pub mod account;
pub mod api;
pub mod checkin;
pub mod config;
pub mod notify;
pub mod report;
pub mod waf;

pub use account::{AccountConfig, CookieMap, CookiePayload, InvalidAccountError};
pub use api::{ApiClient, CheckinOutcome};
pub use checkin::{AccountResult, BatchResult, Checker};
pub use config::{AppConfig, ConfigError};
pub use notify::{MessageFormat, Notifier, NotifyConfig};
pub use waf::{BrowserSettings, ChromeCookieAcquirer, CookieAcquirer, WafCookieSet};

use anyhow::Context;
use std::fs::File;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "checkin.log";

pub fn init_log_env() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // 没有 .env 也没关系，RUST_LOG 可能写在里面
    let file = File::create(LOG_FILE).context("Failed to create log file")?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true),
        )
        .with(
            // 文件层：相同格式，不带颜色
            fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
