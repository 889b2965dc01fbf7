use anyhow::Context;
use anyrouter_checkin::config::{notify_from_env, ACCOUNTS_VAR};
use anyrouter_checkin::{
    init_log_env, report, ApiClient, AppConfig, Checker, ChromeCookieAcquirer, MessageFormat,
    Notifier,
};
use chrono::Local;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_log_env() {
        eprintln!("{:#}", e);
    }
    info!("AnyRouter.top multi-account auto check-in started");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            error!("unable to load account configuration, exiting");
            // 账号配置坏了，通知渠道可能还能用
            if let Ok(notifier) = Notifier::from_config(&notify_from_env()) {
                let err = anyhow::Error::new(e);
                notifier
                    .push_message(report::ERROR_TITLE, &report::error_body(&err), MessageFormat::Text)
                    .await;
            }
            return ExitCode::FAILURE;
        }
    };

    let notifier = match Notifier::from_config(&config.notify) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config, &notifier).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("error during execution: {:#}", e);
            notifier
                .push_message(report::ERROR_TITLE, &report::error_body(&e), MessageFormat::Text)
                .await;
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, notifier: &Notifier) -> anyhow::Result<bool> {
    let api = ApiClient::new().context("Failed to create API client")?;
    let acquirer = ChromeCookieAcquirer::new(api.login_url(), config.browser.clone());
    let checker = Checker::new(config.accounts, acquirer, api);

    let batch = checker.run().await;
    if batch.results.is_empty() {
        warn!("no accounts configured in {}", ACCOUNTS_VAR);
        return Ok(false);
    }

    let executed_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let summary = report::build_summary(&batch, &executed_at);
    info!("\n{}", summary);

    notifier
        .push_message(report::RESULT_TITLE, &summary, MessageFormat::Text)
        .await;
    Ok(batch.overall_success)
}
