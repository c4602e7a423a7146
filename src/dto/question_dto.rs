use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::question::{BloomLevel, OptionMap, Question, QuestionType};
use crate::services::bank_service::MembershipReport;

#[derive(Debug, Clone, Serialize)]
pub struct QuestionResponse {
    pub id: i64,
    pub question: String,
    pub answer: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub options: Option<OptionMap>,
    pub context: Option<String>,
    pub bank_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        let options = q.decoded_options().into_payload();
        Self {
            id: q.id,
            question: q.question,
            answer: q.answer,
            level: q.level,
            question_type: q.question_type,
            options,
            context: q.context,
            bank_id: q.bank_id,
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestionPayload {
    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub question: String,
    pub answer: Option<String>,
    #[validate(length(max = 32, message = "Level must be at most 32 characters"))]
    pub level: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(max = 32, message = "Question type must be at most 32 characters"))]
    pub question_type: Option<String>,
    pub options: Option<OptionMap>,
    pub context: Option<String>,
    pub bank_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateQuestionPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    #[validate(length(min = 1))]
    pub question: Option<String>,
    pub answer: Option<String>,
    #[validate(length(max = 32, message = "Level must be at most 32 characters"))]
    pub level: Option<String>,
    #[serde(rename = "type")]
    #[validate(length(max = 32, message = "Question type must be at most 32 characters"))]
    pub question_type: Option<String>,
    pub options: Option<OptionMap>,
    /// Absent leaves the bank untouched, `null` unbanks the question.
    #[serde(default, deserialize_with = "present_or_null")]
    pub bank_id: Option<Option<i64>>,
}

impl UpdateQuestionPayload {
    /// Banks whose membership this update changes, given the question's current bank.
    pub fn banks_touched(&self, current: Option<i64>) -> Vec<i64> {
        match self.bank_id {
            Some(target) if target != current => current.into_iter().chain(target).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct QuestionListQuery {
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub bank_id: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl QuestionListQuery {
    pub fn paging(&self) -> (i64, i64) {
        paging(self.skip, self.limit)
    }
}

pub fn paging(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (skip.unwrap_or(0).max(0), limit.unwrap_or(100).clamp(1, 500))
}

/// A sanitised model candidate, not yet stored.
#[derive(Debug, Clone)]
pub struct GeneratedQuestion {
    pub question: String,
    pub answer: Option<String>,
    pub level: Option<String>,
    pub question_type: Option<String>,
    pub options: Option<OptionMap>,
    pub context: Option<String>,
}

/// Requested counts for one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub level_counts: Vec<(BloomLevel, u32)>,
    pub type_counts: Vec<(QuestionType, u32)>,
    pub api_key: Option<String>,
}

impl GenerationRequest {
    /// Handles one multipart text field; returns false when the name is not a count.
    pub fn apply_field(&mut self, name: &str, value: &str) -> Result<bool> {
        if name == "api_key" {
            let key = value.trim();
            self.api_key = (!key.is_empty()).then(|| key.to_string());
            return Ok(true);
        }

        if let Some(level) = BloomLevel::parse(name) {
            let count = parse_count(name, value)?;
            upsert(&mut self.level_counts, level, count);
            return Ok(true);
        }

        if let Some(kind) = QuestionType::parse(name) {
            let count = parse_count(name, value)?;
            upsert(&mut self.type_counts, kind, count);
            return Ok(true);
        }

        Ok(false)
    }

    pub fn level_total(&self) -> u64 {
        self.level_counts.iter().map(|(_, c)| u64::from(*c)).sum()
    }

    pub fn type_total(&self) -> u64 {
        self.type_counts.iter().map(|(_, c)| u64::from(*c)).sum()
    }

    pub fn validate_totals(&self) -> Result<()> {
        let total_questions = self.level_total();
        let total_types = self.type_total();

        if total_questions == 0 {
            return Err(Error::BadRequest(
                "Select at least one Bloom's taxonomy level".to_string(),
            ));
        }
        if total_types == 0 {
            return Err(Error::BadRequest(
                "Select at least one question type".to_string(),
            ));
        }
        if total_questions != total_types {
            return Err(Error::BadRequest(format!(
                "Total question count ({}) does not match total question types ({})",
                total_questions, total_types
            )));
        }
        Ok(())
    }

    pub fn requested_levels(&self) -> impl Iterator<Item = (BloomLevel, u32)> + '_ {
        self.level_counts.iter().copied().filter(|(_, c)| *c > 0)
    }

    pub fn requested_types(&self) -> impl Iterator<Item = (QuestionType, u32)> + '_ {
        self.type_counts.iter().copied().filter(|(_, c)| *c > 0)
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| Error::BadRequest(format!("Invalid count for {}: {}", name, value)))
}

fn upsert<K: PartialEq>(counts: &mut Vec<(K, u32)>, key: K, count: u32) {
    match counts.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = count,
        None => counts.push((key, count)),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RephrasePayload {
    #[validate(length(min = 1, message = "Question text must not be empty"))]
    pub question_text: String,
    pub question_type: Option<String>,
    pub bloom_level: Option<String>,
    pub category: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RephraseResponse {
    pub original: String,
    pub rephrased: String,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub level: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveToBankPayload {
    #[serde(default)]
    pub question_ids: Vec<i64>,
    pub bank_id: Option<i64>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub bank_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub success: bool,
    pub message: String,
    pub bank_id: i64,
    pub bank_name: String,
}

impl MembershipResponse {
    pub fn added(report: MembershipReport) -> Self {
        Self::from_report(report, "added to")
    }

    pub fn removed(report: MembershipReport) -> Self {
        Self::from_report(report, "removed from")
    }

    fn from_report(report: MembershipReport, action: &str) -> Self {
        Self {
            success: true,
            message: format!("{} questions {} bank", report.updated_count(), action),
            bank_id: report.bank_id,
            bank_name: report.bank_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub total_questions: usize,
    pub questions: Vec<QuestionResponse>,
}

impl From<Vec<QuestionResponse>> for GenerationResponse {
    fn from(questions: Vec<QuestionResponse>) -> Self {
        Self {
            success: true,
            total_questions: questions.len(),
            questions,
        }
    }
}

pub(crate) fn trim_optional_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

fn present_or_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::bank_service::MembershipChange;

    #[test]
    fn generation_counts_must_balance() {
        let mut request = GenerationRequest::default();
        request.apply_field("remember", "2").unwrap();
        request.apply_field("apply", "1").unwrap();
        request.apply_field("multiple_choice", "2").unwrap();

        let err = request.validate_totals().unwrap_err();
        assert!(err.to_string().contains("(3)"));

        request.apply_field("true_false", "1").unwrap();
        assert!(request.validate_totals().is_ok());
    }

    #[test]
    fn generation_requires_levels_and_types() {
        let mut request = GenerationRequest::default();
        assert!(request
            .validate_totals()
            .unwrap_err()
            .to_string()
            .contains("Bloom"));

        request.apply_field("create", "1").unwrap();
        assert!(request
            .validate_totals()
            .unwrap_err()
            .to_string()
            .contains("question type"));
    }

    #[test]
    fn unknown_fields_and_bad_counts() {
        let mut request = GenerationRequest::default();
        assert!(!request.apply_field("file", "x").unwrap());
        assert!(request.apply_field("understand", "many").is_err());
        assert!(request.apply_field("api_key", "  ").unwrap());
        assert_eq!(request.api_key, None);
    }

    #[test]
    fn bank_id_update_distinguishes_absent_and_null() {
        let absent: UpdateQuestionPayload = serde_json::from_str(r#"{"answer": "x"}"#).unwrap();
        assert_eq!(absent.bank_id, None);

        let cleared: UpdateQuestionPayload = serde_json::from_str(r#"{"bank_id": null}"#).unwrap();
        assert_eq!(cleared.bank_id, Some(None));

        let moved: UpdateQuestionPayload = serde_json::from_str(r#"{"bank_id": 7}"#).unwrap();
        assert_eq!(moved.bank_id, Some(Some(7)));
    }

    #[test]
    fn membership_message_counts_updates_only() {
        let report = MembershipReport {
            bank_id: 9,
            bank_name: "Biology".into(),
            changes: vec![
                MembershipChange::Updated(1),
                MembershipChange::Skipped(2),
            ],
        };
        let response = MembershipResponse::removed(report);
        assert_eq!(response.message, "1 questions removed from bank");
        assert_eq!(response.bank_name, "Biology");
    }

    #[test]
    fn bank_changes_touch_both_source_and_target() {
        let unbank = UpdateQuestionPayload {
            bank_id: Some(None),
            ..Default::default()
        };
        assert_eq!(unbank.banks_touched(Some(3)), vec![3]);
        assert!(unbank.banks_touched(None).is_empty());

        let moved = UpdateQuestionPayload {
            bank_id: Some(Some(8)),
            ..Default::default()
        };
        assert_eq!(moved.banks_touched(Some(3)), vec![3, 8]);
        assert_eq!(moved.banks_touched(None), vec![8]);
        assert!(moved.banks_touched(Some(8)).is_empty());

        let untouched = UpdateQuestionPayload {
            answer: Some("x".into()),
            ..Default::default()
        };
        assert!(untouched.banks_touched(Some(3)).is_empty());
    }

    #[test]
    fn oversized_level_or_type_fails_validation() {
        let create: CreateQuestionPayload = serde_json::from_str(&format!(
            r#"{{"question": "Define osmosis.", "level": "{}"}}"#,
            "R".repeat(33)
        ))
        .unwrap();
        assert!(create.validate().is_err());

        let update: UpdateQuestionPayload = serde_json::from_str(&format!(
            r#"{{"type": "{}"}}"#,
            "t".repeat(40)
        ))
        .unwrap();
        assert!(update.validate().is_err());

        let ok: UpdateQuestionPayload =
            serde_json::from_str(r#"{"level": "Remember", "type": "true_false"}"#).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None), (0, 100));
        assert_eq!(paging(Some(-5), Some(10_000)), (0, 500));
    }
}
