use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::engine::{DialogEngine, InsuranceDialog};
use crate::errors::{DialogError, SinkError};
use crate::extraction::{DocumentExtractor, IdentityFields, VehicleFields};
use crate::policy::PolicyGenerator;
use crate::session::{Session, SessionStore, UserId};
use crate::states::{DialogAction, DialogEvent, DialogState, Instruction};
use crate::storage::{DocumentKind, DocumentStore};

const DELIVERY_CAPTION: &str = "Here is your insurance policy. Thank you! ✅";

/// Phrasing seam. Implementations perform one best-effort call to the
/// text-generation service and substitute a fixed fallback on failure;
/// callers always get a sendable string back.
#[async_trait]
pub trait Phraser: Send + Sync {
    async fn phrase(&self, instruction: Instruction) -> String;
}

/// Outbound side of the transport: plain replies and document delivery.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), SinkError>;
    async fn send_document(
        &self,
        user: UserId,
        reference: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), SinkError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: UserId,
    pub payload: InboundPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundPayload {
    Start,
    Photo(Vec<u8>),
    Text(String),
}

/// Drives the state machine for one inbound event at a time. Callers must
/// serialize events per user id (see the server dispatcher); events for
/// different users may run concurrently.
pub struct DialogService {
    engine: DialogEngine<InsuranceDialog>,
    sessions: Arc<dyn SessionStore>,
    documents: Arc<dyn DocumentStore>,
    extractor: Arc<dyn DocumentExtractor>,
    policies: PolicyGenerator,
    phraser: Arc<dyn Phraser>,
    sink: Arc<dyn ReplySink>,
}

impl DialogService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        documents: Arc<dyn DocumentStore>,
        extractor: Arc<dyn DocumentExtractor>,
        policies: PolicyGenerator,
        phraser: Arc<dyn Phraser>,
        sink: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            engine: DialogEngine::default(),
            sessions,
            documents,
            extractor,
            policies,
            phraser,
            sink,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<(), DialogError> {
        let user = event.user;
        let existing = self.sessions.get(user).await;

        let mut session = match (&existing, &event.payload) {
            (None, InboundPayload::Start) => Session::new(self.engine.initial_state()),
            (None, _) => {
                // No active dialog: nothing is listening for this input.
                debug!(
                    event_name = "dialog.event_ignored",
                    user_id = %user,
                    reason = "no_active_session",
                    "dropping event without an active dialog"
                );
                return Ok(());
            }
            (Some(session), _) => session.clone(),
        };

        let dialog_event = match &event.payload {
            InboundPayload::Start => DialogEvent::Started,
            InboundPayload::Photo(_) => DialogEvent::PhotoReceived,
            InboundPayload::Text(text) => DialogEvent::TextReceived(text.clone()),
        };

        let outcome = self.engine.apply(session.state, &dialog_event);
        if outcome.is_no_op() {
            debug!(
                event_name = "dialog.event_ignored",
                user_id = %user,
                state = ?session.state,
                reason = "unaccepted_input",
                "input not accepted in the current state"
            );
            return Ok(());
        }

        let mut discard = false;
        let executed = self
            .execute(&outcome.actions, user, &mut session, &event.payload, &mut discard)
            .await;

        match executed {
            Ok(()) => {
                info!(
                    event_name = "dialog.transition_applied",
                    user_id = %user,
                    from = ?outcome.from,
                    to = ?outcome.to,
                    "dialog transition applied"
                );
                if discard {
                    self.sessions.remove(user).await;
                } else {
                    session.state = outcome.to;
                    self.sessions.put(user, session).await;
                }
                Ok(())
            }
            Err(DialogError::MissingSession { user }) => {
                // Session data the table guarantees was gone. Restart the
                // document collection instead of wedging the dialog.
                warn!(
                    event_name = "dialog.session_reset",
                    user_id = %user,
                    "session data missing; resetting user to the first document step"
                );
                self.sessions.put(user, Session::new(DialogState::Passport)).await;
                let text = self.phraser.phrase(Instruction::RequestResubmission).await;
                self.sink.send_text(user, &text).await?;
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn execute(
        &self,
        actions: &[DialogAction],
        user: UserId,
        session: &mut Session,
        payload: &InboundPayload,
        discard: &mut bool,
    ) -> Result<(), DialogError> {
        for action in actions {
            match action {
                DialogAction::ResetSession => {
                    *session = Session::new(DialogState::Passport);
                }
                DialogAction::StoreIdentityDocument => {
                    let path = self
                        .documents
                        .save_attachment(user, DocumentKind::Identity, photo_bytes(payload)?)
                        .await?;
                    session.identity_document = Some(path);
                }
                DialogAction::StoreVehicleDocument => {
                    let path = self
                        .documents
                        .save_attachment(user, DocumentKind::Vehicle, photo_bytes(payload)?)
                        .await?;
                    session.vehicle_document = Some(path);
                }
                DialogAction::ExtractAndSummarize => {
                    let identity = self.extractor.extract_identity(user)?;
                    let vehicle = self.extractor.extract_vehicle(user)?;
                    let summary = compose_summary(&identity, &vehicle);
                    session.identity = Some(identity);
                    session.vehicle = Some(vehicle);
                    self.sink.send_text(user, &summary).await?;
                }
                DialogAction::SendPhrased(instruction) => {
                    let text = self.phraser.phrase(*instruction).await;
                    self.sink.send_text(user, &text).await?;
                }
                DialogAction::IssuePolicy => {
                    let identity = session
                        .identity
                        .as_ref()
                        .ok_or(DialogError::MissingSession { user })?;
                    let vehicle = session
                        .vehicle
                        .as_ref()
                        .ok_or(DialogError::MissingSession { user })?;
                    let artifact = self.policies.generate(user, identity, vehicle).await?;
                    info!(
                        event_name = "dialog.policy_issued",
                        user_id = %user,
                        policy_number = %artifact.policy_number,
                        "policy artifact generated"
                    );
                    self.sink
                        .send_document(
                            user,
                            &artifact.reference,
                            &artifact.filename,
                            DELIVERY_CAPTION,
                        )
                        .await?;
                }
                DialogAction::DiscardSession => {
                    *discard = true;
                }
            }
        }
        Ok(())
    }
}

fn photo_bytes(payload: &InboundPayload) -> Result<&[u8], DialogError> {
    match payload {
        InboundPayload::Photo(bytes) => Ok(bytes),
        other => Err(DialogError::InvariantViolation(format!(
            "document store action without a photo payload: {other:?}"
        ))),
    }
}

fn compose_summary(identity: &IdentityFields, vehicle: &VehicleFields) -> String {
    let mut summary = String::from("📄 We recognized your details:\n\n");
    for (label, value) in identity.rows() {
        summary.push_str(&format!("{label}: {value}\n"));
    }
    summary.push_str("\n🚗 Vehicle details:\n");
    for (label, value) in vehicle.rows() {
        summary.push_str(&format!("{label}: {value}\n"));
    }
    summary.push_str("\nIs everything correct? (yes / no)");
    summary
}
