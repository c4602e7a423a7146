use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

use crate::config::Config;
use crate::dto::question_dto::{GeneratedQuestion, GenerationRequest, RephrasePayload, RephraseResponse};
use crate::error::{Error, Result};
use crate::models::question::{BloomLevel, OptionMap, QuestionType};

const GENERATION_SYSTEM_PROMPT: &str =
    "You are an expert assessment creator specialized in generating questions based on Bloom's Taxonomy.";
const REPHRASE_SYSTEM_PROMPT: &str =
    "You are an expert at rephrasing assessment questions while maintaining their educational purpose.";

#[derive(Clone)]
pub struct AIService {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    generation_model: String,
    rephrase_model: String,
    max_source_chars: usize,
}

impl AIService {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            generation_model: config.generation_model.clone(),
            rephrase_model: config.rephrase_model.clone(),
            max_source_chars: config.max_source_chars,
        }
    }

    /// A key sent with the request wins over the configured one.
    fn resolve_key(&self, request_key: Option<&str>) -> Result<String> {
        request_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                Error::BadRequest("An OpenAI API key is required for this operation".to_string())
            })
    }

    pub async fn generate_questions(
        &self,
        text: &str,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedQuestion>> {
        let api_key = self.resolve_key(request.api_key.as_deref())?;
        let prompt = build_generation_prompt(text, request, self.max_source_chars);

        let payload = json!({
            "model": self.generation_model,
            "messages": [
                {"role": "system", "content": GENERATION_SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.7,
            "max_tokens": 4000
        });

        tracing::info!(
            model = %self.generation_model,
            requested = request.level_total(),
            "requesting question generation"
        );
        let content = self.chat_completion(&api_key, payload).await?;

        let Some(raw) = extract_question_array(&content) else {
            tracing::error!(content = %content, "failed to parse generation response as JSON");
            return Err(Error::External(
                "Failed to parse the AI response as valid JSON".to_string(),
            ));
        };

        let questions = sanitize_questions(&raw);
        tracing::info!(
            received = raw.len(),
            kept = questions.len(),
            "generated questions sanitized"
        );
        Ok(questions)
    }

    pub async fn rephrase_question(&self, payload: &RephrasePayload) -> Result<RephraseResponse> {
        let api_key = self.resolve_key(payload.api_key.as_deref())?;
        let prompt = build_rephrase_prompt(
            &payload.question_text,
            payload.question_type.as_deref(),
            payload.bloom_level.as_deref(),
        );

        let body = json!({
            "model": self.rephrase_model,
            "messages": [
                {"role": "system", "content": REPHRASE_SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.7,
            "max_tokens": 500
        });

        let content = self.chat_completion(&api_key, body).await?;
        Ok(parse_rephrase(&content, payload))
    }

    async fn chat_completion(&self, api_key: &str, payload: JsonValue) -> Result<String> {
        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "OpenAI request failed");
            return Err(Error::External(format!("OpenAI API error {}", status)));
        }

        let body: JsonValue = res.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::External("Invalid OpenAI response format".to_string()))
    }
}

pub fn build_generation_prompt(text: &str, request: &GenerationRequest, max_chars: usize) -> String {
    let excerpt: String = text.chars().take(max_chars).collect();
    let levels = request
        .requested_levels()
        .map(|(level, count)| format!("{} {}", count, level))
        .collect::<Vec<_>>()
        .join(", ");
    let types = request
        .requested_types()
        .map(|(kind, count)| format!("{} {}", count, kind.as_str().replace('_', " ")))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"Based on the following text, generate assessment questions according to these specifications:

Text: {excerpt}

Bloom's Taxonomy Levels:
{levels}

Question Types:
{types}

For each question, provide:
1. The question text
2. The correct answer
3. The Bloom's taxonomy level
4. The question type
5. For multiple-choice questions, provide 4 options including the correct answer

Format the response as a JSON list with this structure:
[
    {{
        "question": "Question text here",
        "answer": "Correct answer here",
        "level": "Bloom's level (Remember, Understand, etc.)",
        "type": "Question type (multiple_choice, fill_in_blanks, true_false)",
        "options": {{"A": "Option A", "B": "Option B", "C": "Option C", "D": "Option D"}} (only for multiple_choice)
    }}
]"#
    )
}

pub fn build_rephrase_prompt(question: &str, question_type: Option<&str>, bloom_level: Option<&str>) -> String {
    let type_info = question_type
        .map(|t| format!(" as a {} question", t))
        .unwrap_or_default();
    let level_info = bloom_level
        .map(|l| format!(" at the {} level of Bloom's taxonomy", l))
        .unwrap_or_default();

    format!(
        r#"Rephrase the following assessment question{type_info}{level_info}.
Keep the meaning and difficulty level the same but use different wording:

Original question: {question}

Respond with JSON in this format:
{{
    "original": "original question",
    "rephrased": "rephrased question"
}}"#
    )
}

/// Best-effort recovery of the question list from a model reply: the whole
/// reply, a `{"questions": [...]}` wrapper, or the outermost `[ { ... } ]`
/// slice embedded in prose or a code fence.
pub fn extract_question_array(content: &str) -> Option<Vec<JsonValue>> {
    if let Some(items) = serde_json::from_str::<JsonValue>(content.trim())
        .ok()
        .and_then(into_items)
    {
        return Some(items);
    }

    let start = find_array_start(content)?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<JsonValue>(&content[start..=end])
        .ok()
        .and_then(into_items)
}

fn into_items(value: JsonValue) -> Option<Vec<JsonValue>> {
    match value {
        JsonValue::Array(items) => Some(items),
        JsonValue::Object(mut obj) => match obj.remove("questions") {
            Some(JsonValue::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Position of a `[` whose next non-blank character opens an object.
fn find_array_start(content: &str) -> Option<usize> {
    content.char_indices().find_map(|(idx, ch)| {
        if ch != '[' {
            return None;
        }
        content[idx + 1..]
            .trim_start()
            .starts_with('{')
            .then_some(idx)
    })
}

pub fn sanitize_questions(raw: &[JsonValue]) -> Vec<GeneratedQuestion> {
    raw.iter().filter_map(coerce_question).collect()
}

fn coerce_question(v: &JsonValue) -> Option<GeneratedQuestion> {
    let question = v
        .get("question")
        .and_then(|s| s.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let answer = v.get("answer").and_then(scalar_to_string);
    let level = v
        .get("level")
        .and_then(|s| s.as_str())
        .and_then(BloomLevel::parse)
        .map(|level| level.as_str().to_string());
    let kind = v
        .get("type")
        .and_then(|s| s.as_str())
        .and_then(QuestionType::parse);
    let options = v.get("options").and_then(coerce_options);

    Some(GeneratedQuestion {
        question,
        answer,
        level,
        question_type: kind.map(|k| k.as_str().to_string()),
        options,
        context: None,
    })
}

fn scalar_to_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Bool(true) => Some("True".to_string()),
        JsonValue::Bool(false) => Some("False".to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Objects keep their labels; bare arrays are labelled A, B, C, ...
fn coerce_options(v: &JsonValue) -> Option<OptionMap> {
    let map: OptionMap = match v {
        JsonValue::Object(obj) => obj
            .iter()
            .filter_map(|(label, text)| scalar_to_string(text).map(|t| (label.clone(), t)))
            .collect(),
        JsonValue::Array(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .zip('A'..='Z')
            .map(|(text, label)| (label.to_string(), text))
            .collect(),
        _ => return None,
    };
    (!map.is_empty()).then_some(map)
}

pub fn parse_rephrase(content: &str, payload: &RephrasePayload) -> RephraseResponse {
    let parsed = serde_json::from_str::<JsonValue>(content.trim()).ok();
    let rephrased = parsed
        .as_ref()
        .and_then(|v| v.get("rephrased"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let rephrased = match rephrased {
        Some(text) => text,
        None => {
            tracing::warn!("rephrase response was not the expected JSON; using raw text");
            content.trim().to_string()
        }
    };

    let original = parsed
        .as_ref()
        .and_then(|v| v.get("original"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| payload.question_text.clone());

    RephraseResponse {
        original,
        rephrased,
        question_type: payload.question_type.clone(),
        level: payload.bloom_level.clone(),
        category: payload.category.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        let mut request = GenerationRequest::default();
        request.apply_field("remember", "2").unwrap();
        request.apply_field("analyze", "0").unwrap();
        request.apply_field("multiple_choice", "1").unwrap();
        request.apply_field("true_false", "1").unwrap();
        request
    }

    #[test]
    fn prompt_lists_only_requested_counts_and_truncates_text() {
        let text = "x".repeat(50);
        let prompt = build_generation_prompt(&text, &request(), 10);

        assert!(prompt.contains("2 Remember"));
        assert!(!prompt.contains("Analyze"));
        assert!(prompt.contains("1 multiple choice, 1 true false"));
        assert!(prompt.contains(&format!("Text: {}\n", "x".repeat(10))));
    }

    #[test]
    fn rephrase_prompt_mentions_type_and_level() {
        let prompt = build_rephrase_prompt("What is 2+2?", Some("true_false"), Some("Apply"));
        assert!(prompt.contains("as a true_false question"));
        assert!(prompt.contains("at the Apply level"));
        assert!(prompt.contains("Original question: What is 2+2?"));
    }

    #[test]
    fn extracts_plain_and_wrapped_arrays() {
        let plain = extract_question_array(r#"[{"question": "Q1"}]"#).unwrap();
        assert_eq!(plain.len(), 1);

        let wrapped = extract_question_array(r#"{"questions": [{"question": "Q1"}, {"question": "Q2"}]}"#).unwrap();
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn extracts_array_embedded_in_prose() {
        let content = "Here are your questions [as requested]:\n```json\n[\n  {\"question\": \"Q1\", \"options\": [\"a\", \"b\"]}\n]\n```\nGood luck!";
        let items = extract_question_array(content).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question"], "Q1");
    }

    #[test]
    fn unparseable_reply_yields_none() {
        assert!(extract_question_array("I cannot help with that.").is_none());
        assert!(extract_question_array("[{broken").is_none());
    }

    #[test]
    fn sanitizing_drops_blank_questions_and_normalizes_fields() {
        let raw = vec![
            json!({"question": "  ", "answer": "x"}),
            json!({
                "question": "Capital of France?",
                "answer": "Paris",
                "level": "remember",
                "type": "Multiple Choice",
                "options": {"A": "Paris", "B": "Rome", "C": 3}
            }),
            json!({"question": "The sky is green.", "answer": false, "level": "Recall", "type": "true_false"}),
            json!({"question": "Pick one", "type": "essay", "options": ["x", "y"]}),
        ];

        let questions = sanitize_questions(&raw);
        assert_eq!(questions.len(), 3);

        assert_eq!(questions[0].question, "Capital of France?");
        assert_eq!(questions[0].level.as_deref(), Some("Remember"));
        assert_eq!(questions[0].question_type.as_deref(), Some("multiple_choice"));
        let options = questions[0].options.as_ref().unwrap();
        assert_eq!(options.get("C").map(String::as_str), Some("3"));

        assert_eq!(questions[1].answer.as_deref(), Some("False"));
        assert_eq!(questions[1].level, None);

        assert_eq!(questions[2].question_type, None);
        let labelled = questions[2].options.as_ref().unwrap();
        assert_eq!(labelled.get("B").map(String::as_str), Some("y"));
    }

    #[test]
    fn rephrase_falls_back_to_raw_reply() {
        let payload = RephrasePayload {
            question_text: "What is H2O?".into(),
            question_type: Some("fill_in_blanks".into()),
            bloom_level: Some("Remember".into()),
            category: None,
            api_key: None,
        };

        let parsed = parse_rephrase(
            r#"{"original": "What is H2O?", "rephrased": "Which compound is H2O?"}"#,
            &payload,
        );
        assert_eq!(parsed.rephrased, "Which compound is H2O?");
        assert_eq!(parsed.level.as_deref(), Some("Remember"));

        let fallback = parse_rephrase("  Name the compound H2O.  ", &payload);
        assert_eq!(fallback.original, "What is H2O?");
        assert_eq!(fallback.rephrased, "Name the compound H2O.");
        assert_eq!(fallback.question_type.as_deref(), Some("fill_in_blanks"));
    }
}
