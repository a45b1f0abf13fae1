use serde::{Deserialize, Serialize};

/// The stages of the fixed insurance-intake script. Each state accepts a
/// single input modality: photos for the two document states, free text for
/// the two confirmation states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogState {
    Passport,
    CarDoc,
    Confirmation,
    PriceConfirm,
    /// Terminal. No outgoing transitions; the session is discarded on entry.
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogEvent {
    Started,
    PhotoReceived,
    TextReceived(String),
}

/// Fixed semantic instructions handed to the phrasing adapter. The dialog's
/// semantics are machine-controlled; only the wording is delegated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Greet,
    ThankForIdentityDocument,
    DisclosePrice,
    RequestResubmission,
    AcknowledgeAgreement,
    ExplainFixedPrice,
}

impl Instruction {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Greet => "Greet the user and ask them to send a photo of their passport.",
            Self::ThankForIdentityDocument => {
                "Thank the user for the passport photo and ask for a photo of the vehicle registration document."
            }
            Self::DisclosePrice => {
                "Tell the user the insurance costs 100 USD and ask whether they agree."
            }
            Self::RequestResubmission => "Ask the user to send the passport photo again.",
            Self::AcknowledgeAgreement => {
                "Thank the user for agreeing and say the policy is being generated now."
            }
            Self::ExplainFixedPrice => {
                "Explain that 100 USD is a fixed price and the user is welcome to come back later."
            }
        }
    }
}

/// Side effects the dialog service must run, in order, for a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialogAction {
    ResetSession,
    StoreIdentityDocument,
    StoreVehicleDocument,
    ExtractAndSummarize,
    SendPhrased(Instruction),
    IssuePolicy,
    DiscardSession,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: DialogState,
    pub to: DialogState,
    pub actions: Vec<DialogAction>,
}

impl TransitionOutcome {
    /// An input the current state does not accept: same state, no actions.
    pub fn no_op(state: DialogState) -> Self {
        Self { from: state, to: state, actions: Vec::new() }
    }

    pub fn is_no_op(&self) -> bool {
        self.from == self.to && self.actions.is_empty()
    }
}
