use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Cookie name -> value. Ordered so the serialized header is stable.
pub type CookieMap = BTreeMap<String, String>;

/// 用户 cookies 既可以是对象，也可以是 "k=v; k=v" 字符串
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CookiePayload {
    Map(CookieMap),
    Raw(String),
}

impl Default for CookiePayload {
    fn default() -> Self {
        CookiePayload::Map(CookieMap::new())
    }
}

impl CookiePayload {
    pub fn normalize(&self) -> CookieMap {
        match self {
            CookiePayload::Map(map) => map.clone(),
            CookiePayload::Raw(raw) => parse_cookie_str(raw),
        }
    }
}

/// Parses a `k=v; k=v` cookie string. Fragments without `=` are ignored and the
/// value keeps everything after the first `=`.
pub fn parse_cookie_str(raw: &str) -> CookieMap {
    raw.split(';')
        .filter_map(|fragment| fragment.trim().split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// One entry of `ANYROUTER_ACCOUNTS`, as read from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub cookies: CookiePayload,
    #[serde(default)]
    pub api_user: String,
    /// Optional display label.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidAccountError {
    #[error("API user identifier not found")]
    MissingApiUser,
    #[error("invalid cookie configuration")]
    EmptyCookies,
}

/// An account that passed validation and is ready for network work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAccount {
    pub cookies: CookieMap,
    pub api_user: String,
}

impl AccountConfig {
    pub fn new(cookies: CookiePayload, api_user: impl Into<String>) -> Self {
        Self {
            cookies,
            api_user: api_user.into(),
            name: None,
        }
    }

    /// Label used in logs and the summary: the configured name, or `Account N`.
    pub fn label(&self, index: usize) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Account {}", index + 1),
        }
    }

    pub fn validate(&self) -> Result<ValidAccount, InvalidAccountError> {
        let api_user = self.api_user.trim();
        if api_user.is_empty() {
            return Err(InvalidAccountError::MissingApiUser);
        }
        let cookies = self.cookies.normalize();
        if cookies.is_empty() {
            return Err(InvalidAccountError::EmptyCookies);
        }
        Ok(ValidAccount {
            cookies,
            api_user: api_user.to_string(),
        })
    }
}

/// Overlays `user` on top of `waf`; user cookies win on collision.
pub fn merge_cookies(waf: CookieMap, user: &CookieMap) -> CookieMap {
    let mut merged = waf;
    merged.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Serializes cookies into a `Cookie` header value.
pub fn cookie_header(cookies: &CookieMap) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> CookieMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn string_and_map_payloads_normalize_alike() {
        let raw = CookiePayload::Raw("a=1; b=2".into());
        let object = CookiePayload::Map(map(&[("a", "1"), ("b", "2")]));
        assert_eq!(raw.normalize(), object.normalize());
    }

    #[test]
    fn parse_skips_fragments_without_equals() {
        let parsed = parse_cookie_str("session=abc; junk; ;token=x=y==");
        assert_eq!(parsed, map(&[("session", "abc"), ("token", "x=y==")]));
    }

    #[test]
    fn payload_deserializes_from_either_shape() {
        let from_str: AccountConfig =
            serde_json::from_str(r#"{"cookies":"session=abc","api_user":"42"}"#).unwrap();
        let from_obj: AccountConfig =
            serde_json::from_str(r#"{"cookies":{"session":"abc"},"api_user":"42"}"#).unwrap();
        assert_eq!(from_str.validate(), from_obj.validate());
    }

    #[test]
    fn empty_api_user_is_invalid() {
        let account = AccountConfig::new(CookiePayload::Raw("session=abc".into()), " ");
        assert_eq!(
            account.validate(),
            Err(InvalidAccountError::MissingApiUser)
        );
    }

    #[test]
    fn empty_cookie_map_is_invalid() {
        let account = AccountConfig::new(CookiePayload::Raw("no-pairs-here".into()), "42");
        assert_eq!(account.validate(), Err(InvalidAccountError::EmptyCookies));
    }

    #[test]
    fn user_cookie_wins_on_collision() {
        let waf = map(&[("acw_tc", "waf"), ("cdn_sec_tc", "c")]);
        let user = map(&[("acw_tc", "mine"), ("session", "s")]);
        let merged = merge_cookies(waf, &user);
        assert_eq!(merged["acw_tc"], "mine");
        assert_eq!(merged["cdn_sec_tc"], "c");
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn label_falls_back_to_position() {
        let mut account = AccountConfig::default();
        assert_eq!(account.label(2), "Account 3");
        account.name = Some("main".into());
        assert_eq!(account.label(2), "main");
    }

    #[test]
    fn header_joins_pairs() {
        assert_eq!(cookie_header(&map(&[("a", "1"), ("b", "2")])), "a=1; b=2");
    }
}
