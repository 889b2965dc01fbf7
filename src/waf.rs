use crate::account::CookieMap;
use anyhow::{self, Context};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task;
use tracing::{debug, info, warn};

pub const ACW_TC: &str = "acw_tc";
pub const CDN_SEC_TC: &str = "cdn_sec_tc";
pub const ACW_SC_V2: &str = "acw_sc__v2";
pub const REQUIRED_COOKIES: [&str; 3] = [ACW_TC, CDN_SEC_TC, ACW_SC_V2];

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const WINDOW_SIZE: (u32, u32) = (1920, 1080);
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_GRACE: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The three WAF cookies. Only constructible when all of them are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WafCookieSet {
    acw_tc: String,
    cdn_sec_tc: String,
    acw_sc_v2: String,
}

impl WafCookieSet {
    pub fn new(
        acw_tc: impl Into<String>,
        cdn_sec_tc: impl Into<String>,
        acw_sc_v2: impl Into<String>,
    ) -> Self {
        Self {
            acw_tc: acw_tc.into(),
            cdn_sec_tc: cdn_sec_tc.into(),
            acw_sc_v2: acw_sc_v2.into(),
        }
    }

    /// Picks the required cookies out of everything the browser saw. Returns the
    /// names that were missing (or empty) on failure.
    pub fn from_cookies<I>(cookies: I) -> Result<Self, Vec<&'static str>>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut found: CookieMap = cookies
            .into_iter()
            .filter(|(name, value)| REQUIRED_COOKIES.contains(&name.as_str()) && !value.is_empty())
            .collect();

        let missing: Vec<&'static str> = REQUIRED_COOKIES
            .into_iter()
            .filter(|name| !found.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        // missing 为空，三个键一定都在
        let mut take = |name: &str| found.remove(name).unwrap_or_default();
        Ok(Self {
            acw_tc: take(ACW_TC),
            cdn_sec_tc: take(CDN_SEC_TC),
            acw_sc_v2: take(ACW_SC_V2),
        })
    }

    pub fn into_map(self) -> CookieMap {
        CookieMap::from([
            (ACW_TC.to_string(), self.acw_tc),
            (CDN_SEC_TC.to_string(), self.cdn_sec_tc),
            (ACW_SC_V2.to_string(), self.acw_sc_v2),
        ])
    }
}

/// Obtains WAF cookies for one account. Implementations never fail: any problem
/// is logged and reported as `None`.
#[async_trait]
pub trait CookieAcquirer: Send + Sync {
    async fn acquire(&self, account: &str) -> Option<WafCookieSet>;
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
        }
    }
}

/// Launches a fresh Chrome per call and reads the cookies the WAF challenge sets
/// on the login page.
pub struct ChromeCookieAcquirer {
    login_url: String,
    settings: BrowserSettings,
}

impl ChromeCookieAcquirer {
    pub fn new(login_url: impl Into<String>, settings: BrowserSettings) -> Self {
        Self {
            login_url: login_url.into(),
            settings,
        }
    }
}

#[async_trait]
impl CookieAcquirer for ChromeCookieAcquirer {
    async fn acquire(&self, account: &str) -> Option<WafCookieSet> {
        info!("{}: launching browser to obtain WAF cookies", account);
        let login_url = self.login_url.clone();
        let settings = self.settings.clone();

        // 阻塞线程执行Chrome操作，Browser 在闭包结束时 drop，进程随之退出
        let cookies = task::spawn_blocking(move || collect_login_cookies(&login_url, &settings))
            .await
            .context("Chrome task failed")
            .and_then(|res| res);

        let cookies = match cookies {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("{}: error while obtaining WAF cookies: {:#}", account, e);
                return None;
            }
        };

        match WafCookieSet::from_cookies(cookies) {
            Ok(set) => {
                info!("{}: obtained all WAF cookies", account);
                Some(set)
            }
            Err(missing) => {
                warn!("{}: missing WAF cookies: {}", account, missing.join(", "));
                None
            }
        }
    }
}

fn launch_browser(settings: &BrowserSettings) -> anyhow::Result<Browser> {
    let mut builder = LaunchOptions::default_builder();
    builder.headless(settings.headless);
    builder.sandbox(false);
    builder.enable_gpu(false);
    builder.window_size(Some(WINDOW_SIZE));
    builder.args(vec![
        OsStr::new("--disable-blink-features=AutomationControlled"),
        OsStr::new("--disable-dev-shm-usage"),
        OsStr::new("--disable-web-security"),
        OsStr::new("--disable-features=VizDisplayCompositor"),
    ]);
    if let Some(path) = &settings.chrome_path {
        builder.path(Some(path.clone()));
    }

    let options = builder.build().context("Failed to build Chrome options")?;
    Browser::new(options).context("Failed to launch Chrome browser")
}

fn collect_login_cookies(
    login_url: &str,
    settings: &BrowserSettings,
) -> anyhow::Result<Vec<(String, String)>> {
    let browser = launch_browser(settings)?;
    let tab = browser.new_tab().context("Failed to create tab")?;
    tab.set_default_timeout(NAVIGATION_TIMEOUT);
    tab.set_user_agent(BROWSER_USER_AGENT, Some(ACCEPT_LANGUAGE), None)
        .context("Failed to set user agent")?;

    debug!("navigating to {}", login_url);
    tab.navigate_to(login_url)
        .context("Failed to navigate to login page")?
        .wait_until_navigated()
        .context("Login page did not finish loading")?;

    // 有些环境永远等不到 complete，退化为固定等待
    if !wait_for_document_ready(&tab) {
        debug!("document.readyState not complete, waiting {:?}", READY_GRACE);
        std::thread::sleep(READY_GRACE);
    }

    let cookies = tab.get_cookies().context("Failed to get cookies")?;
    debug!("browser holds {} cookies", cookies.len());
    Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
}

fn wait_for_document_ready(tab: &Tab) -> bool {
    let start = Instant::now();
    while start.elapsed() < READY_TIMEOUT {
        let ready = tab
            .evaluate("document.readyState", false)
            .ok()
            .and_then(|obj| obj.value)
            .is_some_and(|v| v.as_str() == Some("complete"));
        if ready {
            return true;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn complete_set_keeps_only_required_cookies() {
        let set = WafCookieSet::from_cookies(pairs(&[
            ("acw_tc", "1"),
            ("cdn_sec_tc", "2"),
            ("acw_sc__v2", "3"),
            ("unrelated", "x"),
        ]))
        .unwrap();
        let map = set.into_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map["acw_sc__v2"], "3");
    }

    #[test]
    fn missing_cookie_is_reported_by_name() {
        let missing =
            WafCookieSet::from_cookies(pairs(&[("acw_tc", "1"), ("acw_sc__v2", "3")])).unwrap_err();
        assert_eq!(missing, vec!["cdn_sec_tc"]);
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let missing = WafCookieSet::from_cookies(pairs(&[
            ("acw_tc", ""),
            ("cdn_sec_tc", "2"),
            ("acw_sc__v2", "3"),
        ]))
        .unwrap_err();
        assert_eq!(missing, vec!["acw_tc"]);
    }

    #[test]
    fn no_cookies_reports_all_three() {
        let missing = WafCookieSet::from_cookies(Vec::new()).unwrap_err();
        assert_eq!(missing, REQUIRED_COOKIES.to_vec());
    }
}
