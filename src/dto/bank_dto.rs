use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dto::question_dto::{trim_optional_string, QuestionResponse};
use crate::models::question_bank::QuestionBank;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBankPayload {
    #[validate(length(min = 1, max = 255, message = "Bank name must be 1-255 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBankPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct BankListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct BankWithQuestions {
    #[serde(flatten)]
    pub bank: QuestionBank,
    pub questions: Vec<QuestionResponse>,
}

/// Body of the membership endpoints: either a bare id list or `{"question_ids": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QuestionIdsPayload {
    Bare(Vec<i64>),
    Wrapped { question_ids: Vec<i64> },
}

impl QuestionIdsPayload {
    pub fn into_ids(self) -> Vec<i64> {
        match self {
            QuestionIdsPayload::Bare(ids) => ids,
            QuestionIdsPayload::Wrapped { question_ids } => question_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_body_accepts_both_shapes() {
        let bare: QuestionIdsPayload = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(bare.into_ids(), vec![1, 2, 3]);

        let wrapped: QuestionIdsPayload =
            serde_json::from_str(r#"{"question_ids": [4]}"#).unwrap();
        assert_eq!(wrapped.into_ids(), vec![4]);
    }

    #[test]
    fn blank_description_is_dropped() {
        let payload: CreateBankPayload =
            serde_json::from_str(r#"{"name": "Physics", "description": "   "}"#).unwrap();
        assert_eq!(payload.description, None);
    }
}
