pub mod chat;
pub mod jobs;
pub mod notifications;
pub mod users;

use axum::response::sse::Event;
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;

/// Shared SSE shape for live subscriptions: one "snapshot" event replaying
/// the current ordered set, then a "change" event per delta passing `keep`.
/// A lagging consumer gets a "reset" event and should re-subscribe (the
/// replay-then-deltas contract makes re-subscription cheap). The watch is
/// released when the stream is dropped, i.e. when the client disconnects.
pub(crate) fn live_events<T, F>(
    snapshot: Vec<T>,
    receiver: broadcast::Receiver<T>,
    keep: F,
) -> impl Stream<Item = Result<Event, axum::Error>>
where
    T: Serialize + Clone + Send + 'static,
    F: Fn(&T) -> bool + Send + 'static,
{
    futures::stream::unfold(
        (Some(snapshot), receiver, keep),
        |(mut snapshot, mut receiver, keep)| async move {
            if let Some(items) = snapshot.take() {
                let event = Event::default().event("snapshot").json_data(&items);
                return Some((event, (None, receiver, keep)));
            }

            loop {
                match receiver.recv().await {
                    Ok(item) if keep(&item) => {
                        let event = Event::default().event("change").json_data(&item);
                        return Some((event, (None, receiver, keep)));
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let event = Event::default().event("reset").data(skipped.to_string());
                        return Some((Ok(event), (None, receiver, keep)));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    )
}
