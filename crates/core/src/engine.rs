use crate::states::{DialogAction, DialogEvent, DialogState, Instruction, TransitionOutcome};

/// A dialog script: an initial state plus a pure transition function. The
/// transition table is total: inputs a state does not accept resolve to a
/// same-state outcome with no actions rather than an error.
pub trait DialogDefinition {
    fn initial_state(&self) -> DialogState;
    fn transition(&self, current: DialogState, event: &DialogEvent) -> TransitionOutcome;
}

/// The four-step insurance intake script.
#[derive(Clone, Debug, Default)]
pub struct InsuranceDialog;

impl DialogDefinition for InsuranceDialog {
    fn initial_state(&self) -> DialogState {
        DialogState::Passport
    }

    fn transition(&self, current: DialogState, event: &DialogEvent) -> TransitionOutcome {
        transition_insurance(current, event)
    }
}

pub struct DialogEngine<F> {
    dialog: F,
}

impl<F> DialogEngine<F>
where
    F: DialogDefinition,
{
    pub fn new(dialog: F) -> Self {
        Self { dialog }
    }

    pub fn initial_state(&self) -> DialogState {
        self.dialog.initial_state()
    }

    pub fn apply(&self, current: DialogState, event: &DialogEvent) -> TransitionOutcome {
        self.dialog.transition(current, event)
    }
}

impl Default for DialogEngine<InsuranceDialog> {
    fn default() -> Self {
        Self::new(InsuranceDialog)
    }
}

fn transition_insurance(current: DialogState, event: &DialogEvent) -> TransitionOutcome {
    use DialogAction::{
        DiscardSession, ExtractAndSummarize, IssuePolicy, ResetSession, SendPhrased,
        StoreIdentityDocument, StoreVehicleDocument,
    };
    use DialogEvent::{PhotoReceived, Started, TextReceived};
    use DialogState::{CarDoc, Confirmation, End, Passport, PriceConfirm};

    let (to, actions) = match (current, event) {
        // /start always restarts: overwrite, no merge.
        (_, Started) => (Passport, vec![ResetSession, SendPhrased(Instruction::Greet)]),
        (Passport, PhotoReceived) => (
            CarDoc,
            vec![StoreIdentityDocument, SendPhrased(Instruction::ThankForIdentityDocument)],
        ),
        (CarDoc, PhotoReceived) => {
            (Confirmation, vec![StoreVehicleDocument, ExtractAndSummarize])
        }
        (Confirmation, TextReceived(text)) if is_yes(text) => {
            (PriceConfirm, vec![SendPhrased(Instruction::DisclosePrice)])
        }
        // Stored documents are retained; only the state regresses.
        (Confirmation, TextReceived(text)) if is_no(text) => {
            (Passport, vec![SendPhrased(Instruction::RequestResubmission)])
        }
        (PriceConfirm, TextReceived(text)) if is_yes(text) => (
            End,
            vec![SendPhrased(Instruction::AcknowledgeAgreement), IssuePolicy, DiscardSession],
        ),
        (PriceConfirm, TextReceived(text)) if is_no(text) => {
            (End, vec![SendPhrased(Instruction::ExplainFixedPrice), DiscardSession])
        }
        _ => return TransitionOutcome::no_op(current),
    };

    TransitionOutcome { from: current, to, actions }
}

fn is_yes(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("yes")
}

fn is_no(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("no")
}
