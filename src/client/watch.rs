use std::time::Duration;

use futures::{Stream, future::BoxFuture};
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::{StreamExt, wrappers::IntervalStream};
use tracing::debug;

use crate::client::tracker::{PollOutcome, RoomChange, RoomTracker};

/// Delay between two polls used by the web client.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Anything able to fetch the current state of a room.
pub trait RoomSource: Send + Sync {
    /// Fetch `code` once.
    fn fetch_room(&self, code: &str) -> BoxFuture<'static, PollOutcome>;
}

/// Poll `code` every `period` and yield the changes seen between polls.
///
/// The stream ends after [`RoomChange::GameOver`] or [`RoomChange::Closed`].
pub fn watch_room<S>(
    source: S,
    code: String,
    period: Duration,
    tracker: RoomTracker,
) -> impl Stream<Item = RoomChange>
where
    S: RoomSource,
{
    async_stream::stream! {
        let mut tracker = tracker;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(ticker);

        while ticks.next().await.is_some() {
            let outcome = source.fetch_room(&code).await;
            if let PollOutcome::Failed(reason) = &outcome {
                debug!(room = %code, %reason, "room poll failed; keeping cached state");
            }

            for change in tracker.observe(outcome) {
                yield change;
            }

            if tracker.is_terminal() {
                break;
            }
        }
    }
}
