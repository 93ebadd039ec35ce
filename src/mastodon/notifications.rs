// Notification fetching: new follows and mentions since the last cursor.
//
// The API delivers notifications newest-first. The processor is responsible
// for folding them oldest-first so the cursor advances monotonically.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::client::MastodonClient;
use super::error::ApiResult;

/// The notification kinds the bot reacts to. Everything else
/// (favourite, reblog, poll, follow_request) maps to `Other` and only
/// advances the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Follow,
    Mention,
    Other,
}

/// The status a mention notification points at.
#[derive(Debug, Clone)]
pub struct RelatedStatus {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A simplified notification, just the fields the bot needs.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    /// Fully-qualified account name of whoever caused the notification.
    pub actor: String,
    pub status: Option<RelatedStatus>,
}

/// Fetch notifications newer than `since_id` (all recent ones when `None`).
pub async fn fetch(
    client: &MastodonClient,
    since_id: Option<&str>,
    limit: Option<u32>,
) -> ApiResult<Vec<Notification>> {
    let mut params: Vec<(&str, String)> = Vec::new();
    if let Some(since) = since_id {
        params.push(("since_id", since.to_string()));
    }
    if let Some(limit) = limit {
        params.push(("limit", limit.to_string()));
    }

    let raw: Vec<RawNotification> = client
        .get_json("/api/v1/notifications", &params, "fetch_notifications")
        .await?;

    // In debug I always want to see the count, even when it's zero.
    if raw.is_empty() {
        debug!(count = 0, "fetched notifications");
    } else {
        info!(count = raw.len(), "fetched notifications");
    }

    Ok(raw.into_iter().map(Notification::from).collect())
}

impl From<RawNotification> for Notification {
    fn from(raw: RawNotification) -> Self {
        let actor = raw.account.map(|a| a.acct).unwrap_or_default();
        // A follow or mention without an actor is unusable; let it fall
        // through as Other so it still advances the cursor.
        let kind = if actor.is_empty() {
            NotificationKind::Other
        } else {
            match raw.kind.as_str() {
                "follow" => NotificationKind::Follow,
                "mention" => NotificationKind::Mention,
                _ => NotificationKind::Other,
            }
        };
        let status = raw.status.map(|s| RelatedStatus {
            id: s.id,
            content: s.content,
            created_at: s.created_at,
        });
        Notification {
            id: raw.id,
            kind,
            actor,
            status,
        }
    }
}

// -- Serde types for /api/v1/notifications --

#[derive(Debug, Deserialize)]
struct RawNotification {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    account: Option<RawAccount>,
    status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    acct: String,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    id: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str, acct: Option<&str>) -> RawNotification {
        RawNotification {
            id: "42".to_string(),
            kind: kind.to_string(),
            account: acct.map(|a| RawAccount {
                acct: a.to_string(),
            }),
            status: None,
        }
    }

    #[test]
    fn known_kinds_map_through() {
        let n = Notification::from(raw("follow", Some("al@example.social")));
        assert_eq!(n.kind, NotificationKind::Follow);
        assert_eq!(n.actor, "al@example.social");

        let n = Notification::from(raw("mention", Some("bee@example.social")));
        assert_eq!(n.kind, NotificationKind::Mention);
    }

    #[test]
    fn unknown_kinds_become_other() {
        for kind in ["favourite", "reblog", "poll", "follow_request"] {
            let n = Notification::from(raw(kind, Some("al@example.social")));
            assert_eq!(n.kind, NotificationKind::Other);
        }
    }

    #[test]
    fn missing_actor_downgrades_to_other() {
        let n = Notification::from(raw("mention", None));
        assert_eq!(n.kind, NotificationKind::Other);
        assert_eq!(n.id, "42");
    }

    #[test]
    fn wire_format_parses() {
        let json = r#"{
            "id": "3001",
            "type": "mention",
            "account": {"acct": "cay@example.social"},
            "status": {
                "id": "9001",
                "content": "<p>toot the horn</p>",
                "created_at": "2026-08-30T10:00:00.000Z"
            }
        }"#;
        let raw: RawNotification = serde_json::from_str(json).unwrap();
        let n = Notification::from(raw);
        assert_eq!(n.kind, NotificationKind::Mention);
        let status = n.status.unwrap();
        assert_eq!(status.id, "9001");
        assert!(status.content.contains("toot the horn"));
    }
}
