// Mastodon REST client: a thin reqwest wrapper with response checking.
//
// Every response funnels through `check_response`, which feeds the quota
// headers to the rate observer before the status code is even looked at;
// a 429 still tells us something about the window.

use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::error::{ApiError, ApiResult};
use super::notifications::{self, Notification};
use super::rate_limit::{RateLimitInfo, RateObserver};
use super::traits::FeedApi;
use super::{followers, statuses};

/// An instance-specific, account-specific Mastodon interface.
///
/// Holds the rate observer behind a Mutex so callers only need `&self`;
/// the bot runs a single control thread, the lock is never contended.
pub struct MastodonClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    observer: Mutex<RateObserver>,
    account_id: Mutex<Option<String>>,
}

impl MastodonClient {
    /// Create a client for the given instance and user token.
    ///
    /// `seed_reset_period` is the last observed reset period from a
    /// previous run (0 = none); it primes the rate observer so the bot
    /// doesn't re-learn the window after every restart.
    pub fn new(base_url: &str, token: &str, seed_reset_period: u64) -> Result<Self> {
        if base_url.is_empty() {
            anyhow::bail!("MastodonClient requires an instance base URL");
        }

        let http = reqwest::Client::builder()
            .user_agent("hornbot/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            observer: Mutex::new(RateObserver::with_seed_period(Utc::now(), seed_reset_period)),
            account_id: Mutex::new(None),
        })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET an absolute URL and run the response through quota tracking and
    /// status checking. Used directly by the follower pagination, which
    /// needs the Link header before the body is consumed.
    pub(crate) async fn get_checked(
        &self,
        url: &str,
        endpoint: &'static str,
    ) -> ApiResult<reqwest::Response> {
        debug!(endpoint, "GET request");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(ApiError::Connectivity)?;
        self.check_response(response, endpoint)
    }

    /// GET an API path with query parameters and deserialize the body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        endpoint: &'static str,
    ) -> ApiResult<T> {
        debug!(endpoint, "GET request");
        let response = self
            .http
            .get(self.api_url(path))
            .query(params)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(ApiError::Connectivity)?;
        let response = self.check_response(response, endpoint)?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::protocol(endpoint, format!("unparseable body: {e}")))
    }

    /// POST a form to an API path with an idempotency key.
    pub(crate) async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
        idempotency_key: &str,
        endpoint: &'static str,
    ) -> ApiResult<()> {
        debug!(endpoint, "POST request");
        let response = self
            .http
            .post(self.api_url(path))
            .bearer_auth(&self.token)
            .header("Idempotency-Key", idempotency_key)
            .form(form)
            .send()
            .await
            .map_err(ApiError::Connectivity)?;
        self.check_response(response, endpoint)?;
        Ok(())
    }

    /// Update the rate observer from the response headers, then check the
    /// status. The quota headers are consumed even on failure responses.
    fn check_response(
        &self,
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> ApiResult<reqwest::Response> {
        let info = RateLimitInfo::from_headers(response.headers());
        self.observer.lock().unwrap().ingest(&info, Utc::now());

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::protocol(endpoint, format!("HTTP status {status}")));
        }
        Ok(response)
    }

    /// Resolve and cache the account id behind the configured token.
    pub async fn resolve_account_id(&self) -> ApiResult<String> {
        if let Some(id) = self.account_id.lock().unwrap().clone() {
            return Ok(id);
        }

        let account: CredentialAccount = self
            .get_json(
                "/api/v1/accounts/verify_credentials",
                &[],
                "verify_credentials",
            )
            .await?;
        if account.id.is_empty() {
            return Err(ApiError::protocol(
                "verify_credentials",
                "no account id in response",
            ));
        }

        debug!(account_id = %account.id, acct = %account.acct, "resolved operating account");
        *self.account_id.lock().unwrap() = Some(account.id.clone());
        Ok(account.id)
    }
}

#[async_trait]
impl FeedApi for MastodonClient {
    async fn fetch_notifications(
        &self,
        since_id: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResult<Vec<Notification>> {
        notifications::fetch(self, since_id, limit).await
    }

    async fn fetch_all_followers(&self, account_id: &str) -> ApiResult<Vec<String>> {
        followers::fetch_all(self, account_id).await
    }

    async fn post_status(&self, content: &str, in_reply_to: Option<&str>) -> ApiResult<()> {
        statuses::post(self, content, in_reply_to).await
    }

    async fn account_id(&self) -> ApiResult<String> {
        self.resolve_account_id().await
    }

    fn rate_remaining(&self) -> u32 {
        self.observer.lock().unwrap().remaining()
    }

    fn estimated_secs_to_reset(&self) -> u64 {
        self.observer.lock().unwrap().estimated_secs_to_reset(Utc::now())
    }

    fn observed_reset_period(&self) -> u64 {
        self.observer.lock().unwrap().observed_period() as u64
    }
}

/// The slice of the verify_credentials response the bot cares about.
#[derive(Debug, Deserialize)]
struct CredentialAccount {
    id: String,
    #[serde(default)]
    acct: String,
}
