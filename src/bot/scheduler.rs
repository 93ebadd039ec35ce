// Broadcast scheduling: split the follower list into rate-safe chunks and
// pace delivery so the quota isn't exhausted before the next reset.
//
// The chunk plan is a pure function of the quota snapshot, so it's tested
// without any clock. Dispatch retries a failed chunk indefinitely: an
// announcement in flight is never silently dropped.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::mastodon::error::ApiResult;
use crate::mastodon::traits::FeedApi;

use super::store::{Cursor, CursorStore};
use super::BotSettings;

/// Quota floor below which the scheduler stops computing and just goes slow.
const LOW_QUOTA_FLOOR: i64 = 5;

/// Largest number of followers addressed in a single post.
const MAX_CHUNK_SIZE: usize = 10;

/// One cycle's broadcast order: who asked, and who should not be addressed.
#[derive(Debug)]
pub struct BroadcastRequest {
    /// Actor → id of the status that triggered the request.
    pub requestors: BTreeMap<String, String>,
    /// Actors to leave out of the broadcast (they already got a personal
    /// reply this cycle).
    pub excluded: HashSet<String>,
}

impl BroadcastRequest {
    pub fn new(requestors: BTreeMap<String, String>, new_followers: &[String]) -> Self {
        let mut excluded: HashSet<String> = new_followers.iter().cloned().collect();
        excluded.extend(requestors.keys().cloned());
        Self {
            requestors,
            excluded,
        }
    }
}

/// How to slice and pace one broadcast run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub chunk_size: usize,
    pub delay_between: Duration,
}

/// Compute chunk size and pacing from the current quota snapshot.
///
/// With comfortable quota, grow the chunk size from 2 until the whole run
/// fits in `calls_remain`; if even the maximum chunk size doesn't fit,
/// spread the run across the remaining window instead. With almost no
/// quota left, fall back to big chunks on a fixed slow cadence.
pub fn plan_chunks(
    follower_count: usize,
    calls_remain: i64,
    est_reset_secs: u64,
    poll_period: Duration,
) -> ChunkPlan {
    if calls_remain < LOW_QUOTA_FLOOR {
        return ChunkPlan {
            chunk_size: MAX_CHUNK_SIZE,
            delay_between: poll_period * 2,
        };
    }

    let mut chunk_size = 2;
    let mut chunks_needed = follower_count.div_ceil(chunk_size);
    while chunks_needed as i64 > calls_remain && chunk_size < MAX_CHUNK_SIZE {
        chunk_size += 1;
        chunks_needed = follower_count.div_ceil(chunk_size);
    }

    let delay_between = if chunks_needed as i64 > calls_remain {
        Duration::from_secs(est_reset_secs / chunks_needed as u64 + 1)
    } else {
        Duration::ZERO
    };

    ChunkPlan {
        chunk_size,
        delay_between,
    }
}

/// Sound the horn: announce the meeting link to every follower, in chunks,
/// then reply to the people who asked.
pub async fn toot_that_horn(
    api: &dyn FeedApi,
    store: &CursorStore,
    cursor: &mut Cursor,
    settings: &BotSettings,
    request: &BroadcastRequest,
) -> ApiResult<()> {
    let account_id = api.account_id().await?;
    let all_followers = api.fetch_all_followers(&account_id).await?;

    // Plain set difference; an absent name is a no-op, not an error.
    let followers: Vec<String> = all_followers
        .into_iter()
        .filter(|acct| !request.excluded.contains(acct))
        .collect();

    let poll_secs = settings.poll_period.as_secs().max(1);
    let est_reset = api.estimated_secs_to_reset();
    // Reserve capacity for ongoing polling and the trailer replies.
    let calls_remain = api.rate_remaining() as i64
        - est_reset.div_ceil(poll_secs) as i64
        - request.requestors.len() as i64;

    let plan = plan_chunks(followers.len(), calls_remain, est_reset, settings.poll_period);
    info!(
        followers = followers.len(),
        calls_remain,
        est_reset_secs = est_reset,
        chunk_size = plan.chunk_size,
        delay_secs = plan.delay_between.as_secs(),
        "sounding the horn"
    );

    for chunk in followers.chunks(plan.chunk_size) {
        let text = announcement_text(chunk, &settings.announce_link);

        // Retry this chunk until it lands. The reset estimate may be early;
        // floor the wait at one poll period so we don't spin.
        loop {
            match api.post_status(&text, None).await {
                Ok(()) => break,
                Err(e) => {
                    let wait = api.estimated_secs_to_reset().max(poll_secs);
                    warn!(
                        error = %e,
                        wait_secs = wait,
                        "failed to toot while sounding the horn; waiting for next reset"
                    );
                    sleep(Duration::from_secs(wait)).await;
                }
            }
        }

        if !plan.delay_between.is_zero() {
            sleep(plan.delay_between).await;
        }
    }

    cursor.last_horn_time = Utc::now().timestamp();
    cursor.api_reset_period = api.observed_reset_period();
    store.save(cursor);

    // Tell each requester the job is done. Best-effort: a failed reply is
    // logged, not retried; the announcement itself already landed.
    for (actor, status_id) in &request.requestors {
        let text = format!(
            "@{actor} Job's done! Toot toot!\n{}",
            settings.announce_link
        );
        if let Err(e) = api.post_status(&text, Some(status_id)).await {
            warn!(actor = %actor, error = %e, "failed to send completion reply");
        }
    }

    Ok(())
}

/// One announcement post: the chunk's mentions, then the herald line.
fn announcement_text(chunk: &[String], link: &str) -> String {
    let mentions = chunk
        .iter()
        .map(|acct| format!("@{acct}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{mentions}\nHear ye, hear ye, Jitsi is in session: {link}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_secs(15);

    #[test]
    fn low_quota_forces_big_slow_chunks() {
        let plan = plan_chunks(100, 4, 600, POLL);
        assert_eq!(plan.chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(plan.delay_between, Duration::from_secs(30));
    }

    #[test]
    fn negative_budget_counts_as_low_quota() {
        let plan = plan_chunks(100, -3, 600, POLL);
        assert_eq!(plan.chunk_size, MAX_CHUNK_SIZE);
    }

    #[test]
    fn grows_chunk_size_until_the_run_fits() {
        // 13 followers, 5 calls: size 2 needs 7 chunks, size 3 needs 5.
        let plan = plan_chunks(13, 5, 600, POLL);
        assert_eq!(plan.chunk_size, 3);
        assert_eq!(plan.delay_between, Duration::ZERO);
    }

    #[test]
    fn quota_just_under_the_floor_goes_slow() {
        // 4 calls left is below the floor: no fitting, big slow chunks.
        let plan = plan_chunks(13, 4, 600, POLL);
        assert_eq!(plan.chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(plan.delay_between, POLL * 2);
    }

    #[test]
    fn small_runs_stay_at_the_minimum_chunk_size() {
        let plan = plan_chunks(10, 50, 600, POLL);
        assert_eq!(plan.chunk_size, 2);
        assert_eq!(plan.delay_between, Duration::ZERO);
    }

    #[test]
    fn oversized_runs_spread_across_the_window() {
        // 200 followers, 10 calls: even size 10 needs 20 chunks. The run
        // is paced to span the remaining window instead.
        let plan = plan_chunks(200, 10, 600, POLL);
        assert_eq!(plan.chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(plan.delay_between, Duration::from_secs(600 / 20 + 1));
    }

    #[test]
    fn zero_followers_need_no_pacing() {
        let plan = plan_chunks(0, 50, 600, POLL);
        assert_eq!(plan.chunk_size, 2);
        assert_eq!(plan.delay_between, Duration::ZERO);
    }

    #[test]
    fn exact_fit_has_no_delay() {
        // 50 followers, size 10 → 5 chunks, exactly 5 calls left.
        let plan = plan_chunks(50, 5, 600, POLL);
        assert_eq!(plan.delay_between, Duration::ZERO);
        assert!(plan.chunk_size <= MAX_CHUNK_SIZE);
        assert_eq!(50usize.div_ceil(plan.chunk_size), 5);
    }

    #[test]
    fn announcement_mentions_every_chunk_member() {
        let chunk = vec!["a@x".to_string(), "b@y".to_string()];
        let text = announcement_text(&chunk, "https://meet.example/room");
        assert!(text.starts_with("@a@x @b@y\n"));
        assert!(text.ends_with("https://meet.example/room"));
        assert!(text.contains("Hear ye"));
    }

    #[test]
    fn broadcast_request_excludes_followers_and_requestors() {
        let mut requestors = BTreeMap::new();
        requestors.insert("req@x".to_string(), "900".to_string());
        let new_followers = vec!["fol@x".to_string()];
        let request = BroadcastRequest::new(requestors, &new_followers);
        assert!(request.excluded.contains("req@x"));
        assert!(request.excluded.contains("fol@x"));
        assert_eq!(request.excluded.len(), 2);
    }
}
