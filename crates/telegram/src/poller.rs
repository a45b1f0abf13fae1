use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use coverbot_core::session::UserId;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{BotTransport, TransportError};
use crate::wire::{classify, UpdateKind};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("update dispatch failed: {0}")]
    Dispatch(String),
}

/// Consumer of classified updates; the server implements this by enqueueing
/// into the per-user serial dispatcher.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, user: UserId, kind: UpdateKind) -> Result<(), DispatchError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Long-poll loop over `getUpdates`. A failed poll backs off and retries; a
/// successful poll resets the retry budget. Exhausted retries end the loop
/// with `Ok` so the caller shuts down in an orderly way instead of
/// panicking. Advancing the offset past every received update acknowledges
/// it to the Bot API.
pub struct UpdatePoller {
    transport: Arc<dyn BotTransport>,
    handler: Arc<dyn UpdateHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl UpdatePoller {
    pub fn new(
        transport: Arc<dyn BotTransport>,
        handler: Arc<dyn UpdateHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        let mut offset: Option<i64> = None;
        let mut attempt = 0_u32;

        loop {
            match self.poll_once(&mut offset).await {
                Ok(PollStatus::Progress) => {
                    attempt = 0;
                }
                Ok(PollStatus::Closed) => {
                    info!(event_name = "ingress.telegram.stream_closed", "update stream closed");
                    return Ok(());
                }
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "telegram long poll failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "long poll retries exhausted; stopping update polling"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    attempt += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    async fn poll_once(&self, offset: &mut Option<i64>) -> Result<PollStatus, TransportError> {
        let Some(updates) = self.transport.get_updates(*offset).await? else {
            return Ok(PollStatus::Closed);
        };

        for update in updates {
            // Acknowledge regardless of whether the update is usable.
            let next_offset = update.update_id + 1;
            *offset = Some(offset.map_or(next_offset, |current| current.max(next_offset)));

            let Some((user, kind)) = classify(&update) else {
                debug!(
                    event_name = "ingress.telegram.update_dropped",
                    update_id = update.update_id,
                    "unsupported update payload"
                );
                continue;
            };

            debug!(
                event_name = "ingress.telegram.update_received",
                update_id = update.update_id,
                user_id = %user,
                kind = kind_label(&kind),
                "received telegram update"
            );

            if let Err(error) = self.handler.handle(user, kind).await {
                warn!(
                    update_id = update.update_id,
                    user_id = %user,
                    error = %error,
                    "update dispatch failed; continuing poll loop"
                );
            }
        }

        Ok(PollStatus::Progress)
    }
}

enum PollStatus {
    Progress,
    Closed,
}

fn kind_label(kind: &UpdateKind) -> &'static str {
    match kind {
        UpdateKind::Start => "start",
        UpdateKind::Photo { .. } => "photo",
        UpdateKind::Text(_) => "text",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use coverbot_core::session::UserId;
    use tokio::sync::Mutex;

    use super::{DispatchError, ReconnectPolicy, UpdateHandler, UpdatePoller};
    use crate::api::{BotTransport, TransportError};
    use crate::wire::{Update, UpdateKind};

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        polls: VecDeque<Result<Option<Vec<Update>>, TransportError>>,
        offsets_seen: Vec<Option<i64>>,
    }

    impl ScriptedTransport {
        fn with_polls(polls: Vec<Result<Option<Vec<Update>>, TransportError>>) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    polls: polls.into(),
                    offsets_seen: Vec::new(),
                }),
            }
        }

        async fn offsets_seen(&self) -> Vec<Option<i64>> {
            self.state.lock().await.offsets_seen.clone()
        }
    }

    #[async_trait]
    impl BotTransport for ScriptedTransport {
        async fn get_updates(
            &self,
            offset: Option<i64>,
        ) -> Result<Option<Vec<Update>>, TransportError> {
            let mut state = self.state.lock().await;
            state.offsets_seen.push(offset);
            state.polls.pop_front().unwrap_or(Ok(None))
        }

        async fn fetch_file(&self, _file_id: &str) -> Result<Vec<u8>, TransportError> {
            Ok(Vec::new())
        }

        async fn send_text(&self, _user: UserId, _text: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn send_document(
            &self,
            _user: UserId,
            _filename: &str,
            _bytes: Vec<u8>,
            _caption: &str,
        ) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<(UserId, UpdateKind)>>,
        fail: bool,
    }

    #[async_trait]
    impl UpdateHandler for RecordingHandler {
        async fn handle(&self, user: UserId, kind: UpdateKind) -> Result<(), DispatchError> {
            self.handled.lock().await.push((user, kind));
            if self.fail {
                return Err(DispatchError::Dispatch("queue full".to_owned()));
            }
            Ok(())
        }
    }

    fn text_update(update_id: i64, user: i64, text: &str) -> Update {
        serde_json::from_str(&format!(
            r#"{{"update_id":{update_id},"message":{{"from":{{"id":{user}}},"text":"{text}"}}}}"#
        ))
        .expect("valid update")
    }

    fn no_delay_policy(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    #[tokio::test]
    async fn advances_the_offset_past_every_update() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![
            Ok(Some(vec![text_update(10, 42, "yes"), text_update(11, 42, "no")])),
            Ok(None),
        ]));
        let handler = Arc::new(RecordingHandler::default());
        let poller = UpdatePoller::new(transport.clone(), handler.clone(), no_delay_policy(1));

        poller.start().await.expect("poller should not fail");

        assert_eq!(transport.offsets_seen().await, vec![None, Some(12)]);
        assert_eq!(handler.handled.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_poll_failure() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![
            Err(TransportError::Request("network down".to_owned())),
            Ok(Some(vec![text_update(1, 7, "/start")])),
            Ok(None),
        ]));
        let handler = Arc::new(RecordingHandler::default());
        let poller = UpdatePoller::new(transport.clone(), handler.clone(), no_delay_policy(2));

        poller.start().await.expect("poller should not fail");

        let handled = handler.handled.lock().await;
        assert_eq!(handled.as_slice(), [(UserId(7), UpdateKind::Start)]);
    }

    #[tokio::test]
    async fn exhausted_retries_stop_the_loop_with_ok() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![
            Err(TransportError::Request("fail-1".to_owned())),
            Err(TransportError::Request("fail-2".to_owned())),
            Err(TransportError::Request("fail-3".to_owned())),
        ]));
        let poller = UpdatePoller::new(
            transport.clone(),
            Arc::new(RecordingHandler::default()),
            no_delay_policy(2),
        );

        poller.start().await.expect("exhausted retries should not be an error");
        assert_eq!(transport.offsets_seen().await.len(), 3);
    }

    #[tokio::test]
    async fn dispatch_failures_do_not_stop_the_loop() {
        let transport = Arc::new(ScriptedTransport::with_polls(vec![
            Ok(Some(vec![text_update(1, 1, "a"), text_update(2, 2, "b")])),
            Ok(None),
        ]));
        let handler = Arc::new(RecordingHandler { fail: true, ..RecordingHandler::default() });
        let poller = UpdatePoller::new(transport, handler.clone(), no_delay_policy(1));

        poller.start().await.expect("poller should not fail");
        assert_eq!(handler.handled.lock().await.len(), 2);
    }

    #[test]
    fn backoff_is_capped_at_the_maximum_delay() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 };
        assert_eq!(policy.backoff(0).as_millis(), 250);
        assert_eq!(policy.backoff(1).as_millis(), 500);
        assert_eq!(policy.backoff(10).as_millis(), 5_000);
    }
}
