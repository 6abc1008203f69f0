//! Progress gateway: relays job state to a waiting client.
//!
//! [`progress_stream`] polls the store on a fixed period and yields one
//! message per read until the job is terminal. The WebSocket handler forwards
//! each message as JSON text and closes the socket after the last one.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{stream, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::AppState;
use crate::jobs::JobStateStore;
use crate::models::JobRecord;

/// State name sent when the job id is unknown or expired.
pub const NOT_FOUND_STATE: &str = "NOT_FOUND";

/// One progress update as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    pub state: String,
    /// Percent complete, 0..=100.
    pub progress: u8,
    pub current_page: u32,
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressMessage {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            state: record.status.as_str().to_string(),
            progress: record.progress_percent,
            current_page: record.current_page,
            total_pages: record.total_pages,
            result: record.result().map(String::from),
            error: record.error().map(String::from),
        }
    }

    pub fn not_found(job_id: &str) -> Self {
        Self {
            state: NOT_FOUND_STATE.to_string(),
            progress: 0,
            current_page: 0,
            total_pages: 0,
            result: None,
            error: Some(format!("Job not found: {}", job_id)),
        }
    }

    /// No further messages follow this one.
    pub fn is_final(&self) -> bool {
        matches!(
            self.state.as_str(),
            "SUCCESS" | "FAILURE" | "CANCELLED" | NOT_FOUND_STATE
        )
    }
}

struct Poller {
    store: Arc<dyn JobStateStore>,
    job_id: String,
    ticker: Interval,
    done: bool,
}

/// Poll `job_id` every `period` and yield each observed state.
///
/// Ends after the first terminal message, or after a single
/// [`NOT_FOUND_STATE`] message if the record does not exist. Store errors
/// skip the tick.
pub fn progress_stream(
    store: Arc<dyn JobStateStore>,
    job_id: String,
    period: Duration,
) -> impl Stream<Item = ProgressMessage> + Send {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let poller = Poller {
        store,
        job_id,
        ticker,
        done: false,
    };

    stream::unfold(poller, |mut poller| async move {
        if poller.done {
            return None;
        }
        loop {
            poller.ticker.tick().await;
            match poller.store.get_state(&poller.job_id).await {
                Ok(Some(record)) => {
                    let message = ProgressMessage::from_record(&record);
                    poller.done = message.is_final();
                    return Some((message, poller));
                }
                Ok(None) => {
                    poller.done = true;
                    let message = ProgressMessage::not_found(&poller.job_id);
                    return Some((message, poller));
                }
                Err(e) => {
                    warn!(job_id = %poller.job_id, "Progress poll failed: {}", e);
                }
            }
        }
    })
}

/// `GET /ocr/progress/:task_id` (WebSocket).
pub async fn progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_progress(socket, state, task_id))
}

async fn forward_progress(socket: WebSocket, state: AppState, task_id: String) {
    let (mut sink, mut incoming) = socket.split();
    let updates = progress_stream(state.store.clone(), task_id.clone(), state.poll_interval);
    futures::pin_mut!(updates);

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else { break };
                let json = match serde_json::to_string(&update) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(job_id = %task_id, "Failed to encode progress: {}", e);
                        break;
                    }
                };
                if sink.send(Message::Text(json)).await.is_err() {
                    debug!(job_id = %task_id, "Progress client went away");
                    return;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    debug!(job_id = %task_id, "Progress client closed");
                    return;
                }
                // Pings are answered by axum; other client messages are ignored.
                Some(Ok(_)) => {}
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobStore;

    #[tokio::test(start_paused = true)]
    async fn test_stream_ends_after_terminal_state() {
        let store = InMemoryJobStore::default();
        store.set_state("job", &JobRecord::progress(1, 0, 2)).await.unwrap();

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            writer
                .set_state("job", &JobRecord::progress(2, 1, 2))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            writer
                .set_state("job", &JobRecord::success("<div>x</div>".to_string(), 2))
                .await
                .unwrap();
        });

        let messages: Vec<ProgressMessage> =
            progress_stream(Arc::new(store), "job".to_string(), Duration::from_millis(500))
                .collect()
                .await;

        let last = messages.last().unwrap();
        assert_eq!(last.state, "SUCCESS");
        assert_eq!(last.progress, 100);
        assert_eq!(last.result.as_deref(), Some("<div>x</div>"));
        assert_eq!(messages.iter().filter(|m| m.is_final()).count(), 1);

        let progress: Vec<u8> = messages.iter().map(|m| m.progress).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_yields_single_not_found() {
        let store = InMemoryJobStore::default();
        let messages: Vec<ProgressMessage> =
            progress_stream(Arc::new(store), "nope".to_string(), Duration::from_millis(500))
                .collect()
                .await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].state, NOT_FOUND_STATE);
    }

    #[test]
    fn test_failure_message_carries_error_only() {
        let message = ProgressMessage::from_record(&JobRecord::failure("boom", 2, 1, 4));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["state"], "FAILURE");
        assert_eq!(json["error"], "boom");
        assert!(json.get("result").is_none());
        assert_eq!(json["progress"], 25);
    }
}
