use crate::account::{merge_cookies, AccountConfig};
use crate::api::ApiClient;
use crate::waf::CookieAcquirer;
use serde::Serialize;
use tracing::{info, warn};

/// Final state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountResult {
    pub success: bool,
    pub account: String,
    pub user_info: Option<String>,
    pub error: Option<String>,
}

impl AccountResult {
    fn failure(account: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            account,
            user_info: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub overall_success: bool,
    pub results: Vec<AccountResult>,
    pub success_count: usize,
    pub total_count: usize,
}

impl BatchResult {
    pub fn from_results(results: Vec<AccountResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            overall_success: success_count > 0,
            success_count,
            total_count: results.len(),
            results,
        }
    }
}

/// Runs the check-in for every configured account, one after another.
pub struct Checker<A> {
    accounts: Vec<AccountConfig>,
    acquirer: A,
    api: ApiClient,
}

impl<A: CookieAcquirer> Checker<A> {
    pub fn new(accounts: Vec<AccountConfig>, acquirer: A, api: ApiClient) -> Self {
        Self {
            accounts,
            acquirer,
            api,
        }
    }

    pub async fn run(&self) -> BatchResult {
        info!("found {} account configurations", self.accounts.len());

        let mut results = Vec::with_capacity(self.accounts.len());
        for (index, account) in self.accounts.iter().enumerate() {
            let label = account.label(index);
            info!("processing {}", label);
            let result = match self.check_in_account(&label, account).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("{}: processing error: {:#}", label, e);
                    AccountResult::failure(label, e.to_string())
                }
            };
            results.push(result);
        }

        let batch = BatchResult::from_results(results);
        info!(
            "check-in finished: {}/{} succeeded",
            batch.success_count, batch.total_count
        );
        batch
    }

    async fn check_in_account(
        &self,
        label: &str,
        account: &AccountConfig,
    ) -> anyhow::Result<AccountResult> {
        let valid = match account.validate() {
            Ok(valid) => valid,
            Err(e) => {
                warn!("{}: {}", label, e);
                return Ok(AccountResult::failure(label.to_string(), e.to_string()));
            }
        };

        let Some(waf) = self.acquirer.acquire(label).await else {
            warn!("{}: unable to obtain WAF cookies", label);
            return Ok(AccountResult::failure(
                label.to_string(),
                "unable to obtain WAF cookies",
            ));
        };

        let cookies = merge_cookies(waf.into_map(), &valid.cookies);
        let outcome = self.api.check_in(label, &cookies, &valid.api_user).await?;
        Ok(AccountResult {
            success: outcome.success,
            account: label.to_string(),
            user_info: outcome.user_info,
            error: outcome.error,
        })
    }
}
