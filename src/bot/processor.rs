// Notification processing: one poll cycle.
//
// The API delivers notifications newest-first; we fold them oldest-first so
// the cursor advances monotonically and a partial failure resumes where it
// left off. The cursor governs forward progress, not per-message delivery:
// it advances even when individual replies fail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::{info, warn};

use crate::mastodon::error::ApiResult;
use crate::mastodon::notifications::{Notification, NotificationKind};
use crate::mastodon::traits::FeedApi;

use super::scheduler::{self, BroadcastRequest};
use super::store::{Cursor, CursorStore};
use super::timefmt::time_to_text;
use super::BotSettings;

/// Trigger requests older than this are presumed stale leftovers from an
/// outage and are dropped.
const MAX_TRIGGER_AGE_HOURS: i64 = 6;

/// The phrase that asks the bot to sound the horn, with the variations
/// people actually type ("sound teh horn", "blow your horn", ...).
pub fn trigger_pattern() -> Regex {
    Regex::new(r"(?i)\b(?:toot|sound|blow)(?:\s+on)?\s+(?:teh|the|that|your?)\s+horn\b").unwrap()
}

/// What one notification batch asks of the bot.
#[derive(Debug, Default)]
pub struct CycleEvents {
    /// Accounts that followed us this cycle, oldest first.
    pub new_followers: Vec<String>,
    /// Actor → id of the status that triggered the request.
    /// Last write wins per actor.
    pub requestors: BTreeMap<String, String>,
    /// The newest notification id seen, for the cursor.
    pub newest_id: Option<String>,
}

/// Classify a notification batch, folding oldest-first.
///
/// `notes` is in API order (newest-first). Stale triggers, meaning the
/// related status is older than six hours, are logged and dropped without
/// a requestor entry.
pub fn classify(notes: &[Notification], trigger: &Regex, now: DateTime<Utc>) -> CycleEvents {
    let mut events = CycleEvents::default();

    for note in notes.iter().rev() {
        info!(id = %note.id, kind = ?note.kind, "notification");
        events.newest_id = Some(note.id.clone());

        match note.kind {
            NotificationKind::Follow => {
                info!(actor = %note.actor, "new follower");
                events.new_followers.push(note.actor.clone());
            }
            NotificationKind::Mention => {
                let Some(status) = &note.status else { continue };
                if !trigger.is_match(&status.content) {
                    continue;
                }
                let age = now - status.created_at;
                if age > chrono::Duration::hours(MAX_TRIGGER_AGE_HOURS) {
                    warn!(
                        actor = %note.actor,
                        status = %status.id,
                        age = %time_to_text(age.num_seconds().max(0) as u64),
                        "dropping stale horn request"
                    );
                    continue;
                }
                info!(
                    actor = %note.actor,
                    status = %status.id,
                    "got a request to sound the horn"
                );
                events
                    .requestors
                    .insert(note.actor.clone(), status.id.clone());
            }
            NotificationKind::Other => {}
        }
    }

    events
}

/// Run one poll cycle: fetch, classify, greet, maybe broadcast, advance.
pub async fn run_cycle(
    api: &dyn FeedApi,
    store: &CursorStore,
    cursor: &mut Cursor,
    trigger: &Regex,
    settings: &BotSettings,
    now: DateTime<Utc>,
) -> ApiResult<()> {
    let since = (!cursor.last_note_id.is_empty()).then_some(cursor.last_note_id.as_str());
    let notes = api.fetch_notifications(since, None).await?;

    let events = classify(&notes, trigger, now);

    if events.new_followers.is_empty() && events.requestors.is_empty() {
        advance_cursor(api, store, cursor, events.newest_id);
        return Ok(());
    }

    let since_horn = now.timestamp() - cursor.last_horn_time;
    let recent_horn = since_horn < settings.horn_window.as_secs() as i64;
    if recent_horn && !events.requestors.is_empty() {
        warn!(
            since_horn = %time_to_text(since_horn.max(0) as u64),
            "refusing to toot again so soon after the last horn"
        );
    }

    // Switch follow greetings based on whether a horn may be sounding.
    let follow_message = if recent_horn || !events.requestors.is_empty() {
        format!(
            "Jitsi may be going right now:\n{}\nAnd I'll let you know the next time someone tells me to toot the horn!",
            settings.announce_link
        )
    } else {
        "I'll let you know when someone tells me to toot the horn!".to_string()
    };

    for follower in &events.new_followers {
        let text = format!("Hello @{follower}, {follow_message}");
        if let Err(e) = api.post_status(&text, None).await {
            warn!(follower = %follower, error = %e, "failed to greet new follower");
        }
    }

    if !events.requestors.is_empty() && !recent_horn {
        let request = BroadcastRequest::new(events.requestors, &events.new_followers);
        scheduler::toot_that_horn(api, store, cursor, settings, &request).await?;
    }
    // Requestors suppressed by the horn window are simply dropped; there is
    // no deferred-request queue.

    advance_cursor(api, store, cursor, events.newest_id);
    Ok(())
}

/// Advance the persisted cursor to the newest id seen, if it moved.
/// Piggybacks the latest observed reset period onto the same write.
fn advance_cursor(
    api: &dyn FeedApi,
    store: &CursorStore,
    cursor: &mut Cursor,
    newest_id: Option<String>,
) {
    let Some(id) = newest_id else { return };
    if cursor.last_note_id == id {
        return;
    }
    cursor.last_note_id = id;
    cursor.api_reset_period = api.observed_reset_period();
    store.save(cursor);
}
