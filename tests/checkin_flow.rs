use anyrouter_checkin::notify::Delivery;
use anyrouter_checkin::{
    config::parse_accounts, report, ApiClient, Checker, CookieAcquirer, MessageFormat, Notifier,
    NotifyConfig, WafCookieSet,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Records which accounts asked for cookies, in order.
#[derive(Default)]
struct RecordingAcquirer {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CookieAcquirer for RecordingAcquirer {
    async fn acquire(&self, account: &str) -> Option<WafCookieSet> {
        self.seen.lock().unwrap().push(account.to_string());
        Some(WafCookieSet::new("tc", "sec", "sc"))
    }
}

#[tokio::test]
async fn accounts_are_checked_in_and_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/user/sign_in"))
        .and(header("cookie", "acw_sc__v2=sc; acw_tc=tc; cdn_sec_tc=sec; session=first"))
        .and(header("new-api-user", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ret": 1, "msg": "ok"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/user/sign_in"))
        .and(header("new-api-user", "2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/user/self"))
        .and(header("new-api-user", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"quota": 1_000_000, "used_quota": 500_000}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wecom"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let accounts = parse_accounts(
        r#"[
            {"cookies": "session=first", "api_user": "1"},
            {"cookies": {"session": "second"}, "api_user": "2", "name": "backup"},
            {"cookies": {}, "api_user": "3"}
        ]"#,
    )
    .unwrap();

    let acquirer = RecordingAcquirer::default();
    let seen = acquirer.seen.clone();
    let api = ApiClient::with_base_url(server.uri()).unwrap();
    let checker = Checker::new(accounts, acquirer, api);
    let batch = checker.run().await;

    // 第三个账号配置无效，不会启动浏览器
    assert_eq!(*seen.lock().unwrap(), ["Account 1", "backup"]);
    assert!(batch.overall_success);
    assert_eq!(batch.success_count, 1);
    assert_eq!(batch.total_count, 3);
    assert_eq!(
        batch.results[0].user_info.as_deref(),
        Some(":money: Current balance: $2.00, Used: $1.00")
    );
    assert_eq!(batch.results[1].account, "backup");
    assert_eq!(batch.results[1].error.as_deref(), Some("HTTP 502"));
    assert_eq!(
        batch.results[2].error.as_deref(),
        Some("invalid cookie configuration")
    );

    let summary = report::build_summary(&batch, "2026-10-15 08:00:00");
    assert!(summary.contains("[SUCCESS] Succeeded: 1/3"));

    let notifier = Notifier::from_config(&NotifyConfig {
        wecom_webhook: Some(format!("{}/wecom", server.uri())),
        ..Default::default()
    })
    .unwrap();
    let report = notifier
        .push_message(report::RESULT_TITLE, &summary, MessageFormat::Text)
        .await;
    assert_eq!(report.sent(), 1);
    assert_eq!(report.channels.last().unwrap().delivery, Delivery::Sent);
}
