// Follower list fetching with Link-header pagination.
//
// Fetched lazily, and only when a broadcast is actually needed. For an
// account with many followers this is a burst of API calls, and the
// scheduler budgets quota around it.

use regex_lite::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::client::MastodonClient;
use super::error::{ApiError, ApiResult};

/// Fetch every follower of the given account as a list of fully-qualified
/// account names, transparently following `Link: <...>; rel="next"` pages.
pub async fn fetch_all(client: &MastodonClient, account_id: &str) -> ApiResult<Vec<String>> {
    if account_id.is_empty() {
        return Err(ApiError::protocol(
            "fetch_followers",
            "no account id provided",
        ));
    }

    let mut accts = Vec::new();
    let mut next = Some(client.api_url(&format!("/api/v1/accounts/{account_id}/followers")));

    while let Some(url) = next {
        let response = client.get_checked(&url, "fetch_followers").await?;

        next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page);

        let page: Vec<RawFollower> = response
            .json()
            .await
            .map_err(|e| ApiError::protocol("fetch_followers", format!("unparseable body: {e}")))?;

        let page_size = page.len();
        for follower in page {
            if !follower.acct.is_empty() {
                accts.push(follower.acct);
            }
        }

        debug!(page_size, total = accts.len(), "fetched page of followers");
    }

    info!(count = accts.len(), "collected followers");
    Ok(accts)
}

/// Pull the `rel="next"` URL out of a Link header, if any.
pub fn next_page(link_header: &str) -> Option<String> {
    let pattern = Regex::new(r#"<([^>]*)>;\s*rel="([^"]*)""#).unwrap();
    let next = pattern
        .captures_iter(link_header)
        .find(|caps| &caps[2] == "next")
        .map(|caps| caps[1].to_string());
    next
}

#[derive(Debug, Deserialize)]
struct RawFollower {
    #[serde(default)]
    acct: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_page_finds_the_next_rel() {
        let header = r#"<https://example.social/api/v1/accounts/1/followers?max_id=7>; rel="next", <https://example.social/api/v1/accounts/1/followers?since_id=9>; rel="prev""#;
        assert_eq!(
            next_page(header).as_deref(),
            Some("https://example.social/api/v1/accounts/1/followers?max_id=7")
        );
    }

    #[test]
    fn next_page_ignores_other_rels() {
        let header = r#"<https://example.social/x>; rel="prev""#;
        assert_eq!(next_page(header), None);
    }

    #[test]
    fn next_page_handles_empty_header() {
        assert_eq!(next_page(""), None);
    }

    #[test]
    fn next_page_order_independent() {
        let header = r#"<https://a/prev>; rel="prev", <https://a/next>; rel="next""#;
        assert_eq!(next_page(header).as_deref(), Some("https://a/next"));
    }
}
