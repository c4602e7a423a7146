use crate::dto::question_dto::{GenerationRequest, QuestionResponse};
use crate::error::{Error, Result};
use crate::services::ai_service::AIService;
use crate::services::question_service::QuestionService;
use crate::services::text_extraction::extract_text;

#[derive(Clone)]
pub struct GenerationService {
    ai: AIService,
    questions: QuestionService,
}

impl GenerationService {
    pub fn new(ai: AIService, questions: QuestionService) -> Self {
        Self { ai, questions }
    }

    /// Checks the requested counts before touching the upload, then extracts,
    /// generates and persists. The stored rows carry their database ids.
    pub async fn generate_from_upload(
        &self,
        filename: &str,
        data: &[u8],
        request: &GenerationRequest,
    ) -> Result<Vec<QuestionResponse>> {
        request.validate_totals()?;

        let text = extract_text(filename, data).await?;
        let generated = self.ai.generate_questions(&text, request).await?;
        if generated.is_empty() {
            return Err(Error::External(
                "The AI response did not contain any usable questions".to_string(),
            ));
        }

        let stored = self.questions.create_generated(&generated).await?;
        tracing::info!(
            filename,
            requested = request.level_total(),
            stored = stored.len(),
            "questions generated from upload"
        );
        Ok(stored.into_iter().map(QuestionResponse::from).collect())
    }
}
