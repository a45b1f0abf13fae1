use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coverbot_core::dialog::{DialogService, InboundEvent, InboundPayload};
use coverbot_core::errors::DialogError;
use coverbot_core::session::UserId;
use coverbot_telegram::api::BotTransport;
use coverbot_telegram::poller::{DispatchError, UpdateHandler};
use coverbot_telegram::wire::UpdateKind;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Per-user queue depth. A chat participant is slow compared to the dialog,
/// so a small bound is generous; overflow drops the newest event.
const QUEUE_DEPTH: usize = 32;

/// Workers exit after this long without an event; the next event for the
/// user spawns a fresh one. Keeps the task set proportional to active
/// conversations instead of every user id ever seen.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Terminal consumer of dispatched events. `DialogService` is the production
/// implementation; tests substitute recording fakes.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: InboundEvent) -> Result<(), DialogError>;
}

#[async_trait]
impl EventSink for DialogService {
    async fn deliver(&self, event: InboundEvent) -> Result<(), DialogError> {
        self.handle(event).await
    }
}

/// Routes classified updates onto one serial queue per user. Events for the
/// same user are processed strictly in arrival order; different users run
/// concurrently. Photo bytes are fetched inside the user's worker so the
/// download cannot reorder events either.
pub struct EventDispatcher {
    sink: Arc<dyn EventSink>,
    transport: Arc<dyn BotTransport>,
    queues: Mutex<HashMap<UserId, mpsc::Sender<UpdateKind>>>,
    idle_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(sink: Arc<dyn EventSink>, transport: Arc<dyn BotTransport>) -> Self {
        Self { sink, transport, queues: Mutex::new(HashMap::new()), idle_timeout: IDLE_TIMEOUT }
    }

    #[cfg(test)]
    fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    async fn sender_for(&self, user: UserId) -> mpsc::Sender<UpdateKind> {
        let mut queues = self.queues.lock().await;
        // Entries whose worker has idled out are dead weight; reap them.
        queues.retain(|_, sender| !sender.is_closed());
        if let Some(sender) = queues.get(&user) {
            return sender.clone();
        }

        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run_worker(
            user,
            receiver,
            self.sink.clone(),
            self.transport.clone(),
            self.idle_timeout,
        ));
        queues.insert(user, sender.clone());
        sender
    }
}

#[async_trait]
impl UpdateHandler for EventDispatcher {
    async fn handle(&self, user: UserId, kind: UpdateKind) -> Result<(), DispatchError> {
        let mut kind = kind;
        // A worker can idle out between lookup and send; one respawn covers
        // that window.
        for _ in 0..2 {
            let sender = self.sender_for(user).await;
            match sender.try_send(kind) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        event_name = "dispatch.queue_overflow",
                        user_id = %user,
                        depth = QUEUE_DEPTH,
                        "per-user queue full; dropping event"
                    );
                    return Ok(());
                }
                Err(mpsc::error::TrySendError::Closed(returned)) => kind = returned,
            }
        }
        Err(DispatchError::Dispatch(format!("worker for user {user} is gone")))
    }
}

async fn run_worker(
    user: UserId,
    mut receiver: mpsc::Receiver<UpdateKind>,
    sink: Arc<dyn EventSink>,
    transport: Arc<dyn BotTransport>,
    idle_timeout: Duration,
) {
    loop {
        let kind = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(kind)) => kind,
            // Channel closed or nothing to do for a while; the dispatcher
            // spawns a fresh worker on the next event.
            Ok(None) | Err(_) => break,
        };
        let payload = match kind {
            UpdateKind::Start => InboundPayload::Start,
            UpdateKind::Text(text) => InboundPayload::Text(text),
            UpdateKind::Photo { file_id } => match transport.fetch_file(&file_id).await {
                Ok(bytes) => InboundPayload::Photo(bytes),
                Err(error) => {
                    warn!(
                        event_name = "dispatch.file_fetch_failed",
                        user_id = %user,
                        file_id = %file_id,
                        error = %error,
                        "could not download photo; skipping event"
                    );
                    continue;
                }
            },
        };

        if let Err(error) = sink.deliver(InboundEvent { user, payload }).await {
            warn!(
                event_name = "dispatch.event_failed",
                user_id = %user,
                error = %error,
                "dialog event failed; continuing with next event"
            );
        }
    }
    debug!(event_name = "dispatch.worker_stopped", user_id = %user, "worker drained");
}
