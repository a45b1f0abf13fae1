use async_trait::async_trait;
use coverbot_core::dialog::Phraser;
use coverbot_core::states::Instruction;
use tracing::warn;

use crate::client::LlmClient;

/// Sent verbatim whenever the text-generation service fails. The user sees
/// an apology, never a raw error, and the dialog transition still completes.
pub const FALLBACK_REPLY: &str =
    "Sorry, something went wrong while generating a reply 😥";

/// Result of a single phrasing attempt, before the fallback is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhrasingOutcome {
    Phrased(String),
    Unavailable,
}

/// Implements the core phrasing seam over any `LlmClient`. One best-effort
/// attempt per instruction; no retry.
pub struct LlmPhraser<C> {
    client: C,
}

impl<C> LlmPhraser<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub async fn attempt(&self, instruction: Instruction) -> PhrasingOutcome {
        match self.client.complete(instruction.prompt()).await {
            Ok(text) => PhrasingOutcome::Phrased(text),
            Err(error) => {
                warn!(
                    event_name = "genai.phrasing_unavailable",
                    instruction = ?instruction,
                    error = %error,
                    "text-generation failed; substituting fallback reply"
                );
                PhrasingOutcome::Unavailable
            }
        }
    }
}

#[async_trait]
impl<C> Phraser for LlmPhraser<C>
where
    C: LlmClient,
{
    async fn phrase(&self, instruction: Instruction) -> String {
        match self.attempt(instruction).await {
            PhrasingOutcome::Phrased(text) => text,
            PhrasingOutcome::Unavailable => FALLBACK_REPLY.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use coverbot_core::dialog::Phraser;
    use coverbot_core::states::Instruction;
    use tokio::sync::Mutex;

    use super::{LlmPhraser, PhrasingOutcome, FALLBACK_REPLY};
    use crate::client::{LlmClient, LlmError};

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Status(503))
        }
    }

    struct RecordingClient {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().await.push(prompt.to_owned());
            Ok(format!("phrased: {prompt}"))
        }
    }

    #[tokio::test]
    async fn failure_returns_exactly_the_fallback_string() {
        let phraser = LlmPhraser::new(FailingClient);
        let text = phraser.phrase(Instruction::Greet).await;
        assert_eq!(text, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn failure_is_visible_as_unavailable_before_the_fallback() {
        let phraser = LlmPhraser::new(FailingClient);
        assert_eq!(phraser.attempt(Instruction::DisclosePrice).await, PhrasingOutcome::Unavailable);
    }

    #[tokio::test]
    async fn success_passes_the_instruction_prompt_to_the_client() {
        let phraser = LlmPhraser::new(RecordingClient { prompts: Mutex::new(Vec::new()) });
        let text = phraser.phrase(Instruction::ExplainFixedPrice).await;

        assert_eq!(text, format!("phrased: {}", Instruction::ExplainFixedPrice.prompt()));
        let prompts = phraser.client.prompts.lock().await;
        assert_eq!(prompts.as_slice(), [Instruction::ExplainFixedPrice.prompt()]);
    }
}
