use std::sync::Arc;

use async_trait::async_trait;
use poolchat_core::domain::fragment::FragmentPayload;
use poolchat_core::domain::intent::{Intent, IntentKind};
use poolchat_core::errors::SpecialistError;

use crate::llm::LlmClient;
use crate::prompts;
use crate::specialists::Specialist;
use crate::text::collapse_whitespace;

/// Free-form pool care and troubleshooting answers from the language model.
pub struct AdvisorySpecialist {
    llm: Arc<dyn LlmClient>,
}

impl AdvisorySpecialist {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Specialist for AdvisorySpecialist {
    fn name(&self) -> &'static str {
        "advisory"
    }

    fn handles(&self) -> &'static [IntentKind] {
        &[IntentKind::Advisory]
    }

    async fn handle(&self, intent: &Intent) -> Result<FragmentPayload, SpecialistError> {
        let question = intent
            .slots
            .search_term
            .as_deref()
            .map(collapse_whitespace)
            .filter(|question| !question.is_empty())
            .ok_or_else(|| SpecialistError::BadRequest("advisory question is empty".to_owned()))?;

        let answer = self
            .llm
            .complete(&prompts::advisory(&question))
            .await
            .map_err(|error| SpecialistError::Unavailable(format!("advisory model: {error}")))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SpecialistError::InvalidResponse("advisory model returned no text".to_owned()));
        }
        Ok(FragmentPayload::Advisory(answer.to_string()))
    }
}
