// Feed API trait: the swap-ready abstraction over the Mastodon client.
//
// The bot logic (processor, scheduler, poll loop) only talks to this trait,
// so tests can drive a whole cycle with a scripted mock and no network.

use async_trait::async_trait;

use super::error::ApiResult;
use super::notifications::Notification;

/// Everything the bot needs from the social API. Implemented for real by
/// `MastodonClient`; implementations must be async because every operation
/// is an HTTP call underneath.
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Notifications newer than `since_id`, newest-first as the API
    /// delivers them.
    async fn fetch_notifications(
        &self,
        since_id: Option<&str>,
        limit: Option<u32>,
    ) -> ApiResult<Vec<Notification>>;

    /// The full follower list for an account, pagination followed
    /// transparently.
    async fn fetch_all_followers(&self, account_id: &str) -> ApiResult<Vec<String>>;

    /// Post a status, optionally in reply to another. Submission carries a
    /// derived idempotency key so transport-level retries never double-post.
    async fn post_status(&self, content: &str, in_reply_to: Option<&str>) -> ApiResult<()>;

    /// The operating account's id, resolved once and cached.
    async fn account_id(&self) -> ApiResult<String>;

    /// Last known remaining-call count for the current quota window.
    fn rate_remaining(&self) -> u32;

    /// Estimated seconds until the next quota reset, from observation.
    fn estimated_secs_to_reset(&self) -> u64;

    /// Mean observed reset period in whole seconds, for persistence.
    fn observed_reset_period(&self) -> u64;
}
