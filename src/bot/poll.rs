// The top-level poll loop: a cooperative single-task cycle, not a server.
//
// The process alternates between one outstanding network call and sleeping.
// Connectivity errors drive the backoff machine; protocol errors abandon
// the cycle and the next one starts on the normal schedule. Persisted
// state is rewritten wholesale, so external termination at any point is
// safe; the last successful write wins.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::mastodon::traits::FeedApi;

use super::backoff::{self, Backoff, MAX_CONSECUTIVE_FAILURES};
use super::processor;
use super::store::CursorStore;
use super::timefmt::time_to_text;
use super::BotSettings;

/// Run the bot until a fatal backoff state or external termination.
pub async fn run(api: Arc<dyn FeedApi>, store: CursorStore, settings: BotSettings) -> Result<()> {
    let mut cursor = store.load();
    let trigger = processor::trigger_pattern();
    let mut state = Backoff::Healthy;
    let mut slept_failing = Duration::ZERO;

    info!(
        poll_secs = settings.poll_period.as_secs(),
        last_note_id = %cursor.last_note_id,
        reset_period = cursor.api_reset_period,
        "starting poll loop"
    );

    loop {
        let outcome = processor::run_cycle(
            api.as_ref(),
            &store,
            &mut cursor,
            &trigger,
            &settings,
            Utc::now(),
        )
        .await;

        match outcome {
            Ok(()) => {
                state = state.on_success();
                slept_failing = Duration::ZERO;
                sleep(settings.poll_period).await;
            }
            Err(err) if err.is_connectivity() => {
                state = state.on_failure();
                match state {
                    Backoff::Fatal => {
                        error!(
                            failures = MAX_CONSECUTIVE_FAILURES,
                            waited = %time_to_text(slept_failing.as_secs()),
                            "giving up after repeated connection failures"
                        );
                        anyhow::bail!(
                            "gave up after {MAX_CONSECUTIVE_FAILURES} consecutive connection failures"
                        );
                    }
                    Backoff::Failing(n) => {
                        let wait = backoff::delay(n, settings.poll_period, settings.backoff_cap);
                        slept_failing += wait;
                        warn!(
                            error = %err,
                            failures = n,
                            wait_secs = wait.as_secs(),
                            total_waited = %time_to_text(slept_failing.as_secs()),
                            "connection failure; backing off"
                        );
                        sleep(wait).await;
                    }
                    Backoff::Healthy => unreachable!("on_failure never yields Healthy"),
                }
            }
            Err(err) => {
                // The server is reachable, it just answered badly. Abandon
                // the cycle; it also resets the connection-failure streak.
                warn!(error = %err, "cycle abandoned");
                state = state.on_success();
                slept_failing = Duration::ZERO;
                sleep(settings.poll_period).await;
            }
        }
    }
}
