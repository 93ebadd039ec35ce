// Status posting with derived idempotency keys.
//
// The key is deterministic over the reply target and the alphanumeric
// characters of the content, so a transport-level retry of the same post
// can never double-deliver.

use tracing::debug;

use super::client::MastodonClient;
use super::error::{ApiError, ApiResult};

/// Post a new status, optionally in reply to an existing one.
/// Visibility is always public; this bot has nothing to whisper.
pub async fn post(
    client: &MastodonClient,
    content: &str,
    in_reply_to: Option<&str>,
) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::protocol("post_status", "content is empty"));
    }

    let key = idempotency_key(content, in_reply_to);
    debug!(reply_to = ?in_reply_to, chars = content.chars().count(), "posting status");

    let mut form: Vec<(&str, &str)> = vec![("status", content), ("visibility", "public")];
    if let Some(status_id) = in_reply_to {
        form.push(("in_reply_to_id", status_id));
    }

    client
        .post_form("/api/v1/statuses", &form, &key, "post_status")
        .await
}

/// Derive the idempotency key for a post: a context prefix plus every
/// word character of the content, in order.
pub fn idempotency_key(content: &str, in_reply_to: Option<&str>) -> String {
    let mut key = match in_reply_to {
        Some(status_id) => format!("Hornbot.Reply.{status_id}."),
        None => "Hornbot.Toot.".to_string(),
    };
    key.extend(
        content
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_'),
    );
    key
}
