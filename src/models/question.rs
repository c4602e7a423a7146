use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;

/// Option label (`"A"`, `"B"`, ...) to option text.
pub type OptionMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remember,
        BloomLevel::Understand,
        BloomLevel::Apply,
        BloomLevel::Analyze,
        BloomLevel::Evaluate,
        BloomLevel::Create,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloomLevel::Remember => "Remember",
            BloomLevel::Understand => "Understand",
            BloomLevel::Apply => "Apply",
            BloomLevel::Analyze => "Analyze",
            BloomLevel::Evaluate => "Evaluate",
            BloomLevel::Create => "Create",
        }
    }

    /// Case-insensitive; `"APPLY"`, `"apply"` and `" Apply "` all parse.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    FillInBlanks,
    TrueFalse,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [
        QuestionType::MultipleChoice,
        QuestionType::FillInBlanks,
        QuestionType::TrueFalse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::FillInBlanks => "fill_in_blanks",
            QuestionType::TrueFalse => "true_false",
        }
    }

    /// Accepts `multiple_choice`, `Multiple Choice` and `multiple-choice` alike.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(|c: char| c == ' ' || c == '-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub answer: Option<String>,
    pub level: Option<String>,
    pub question_type: Option<String>,
    pub options: Option<String>,
    pub context: Option<String>,
    pub bank_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    pub fn bloom_level(&self) -> Option<BloomLevel> {
        self.level.as_deref().and_then(BloomLevel::parse)
    }

    pub fn kind(&self) -> Option<QuestionType> {
        self.question_type.as_deref().and_then(QuestionType::parse)
    }

    pub fn decoded_options(&self) -> DecodedOptions {
        DecodedOptions::decode(self.options.as_deref())
    }
}

/// Outcome of reading the serialized `options` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedOptions {
    Absent,
    Parsed(OptionMap),
    Malformed,
}

impl DecodedOptions {
    pub fn decode(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => DecodedOptions::Absent,
            Some(text) => match serde_json::from_str::<OptionMap>(text) {
                Ok(map) => DecodedOptions::Parsed(map),
                Err(_) => DecodedOptions::Malformed,
            },
        }
    }

    /// `Malformed` degrades to an empty map.
    pub fn into_payload(self) -> Option<OptionMap> {
        match self {
            DecodedOptions::Absent => None,
            DecodedOptions::Parsed(map) => Some(map),
            DecodedOptions::Malformed => Some(OptionMap::new()),
        }
    }
}

pub fn encode_options(options: Option<&OptionMap>) -> Option<String> {
    options
        .filter(|map| !map.is_empty())
        .and_then(|map| serde_json::to_string(map).ok())
}

/// Canonical storage form for a free-form level string. Unrecognised values
/// are kept trimmed so nothing the caller sent is lost.
pub fn normalize_level(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    Some(
        BloomLevel::parse(raw)
            .map(|level| level.as_str().to_string())
            .unwrap_or_else(|| raw.to_string()),
    )
}

pub fn normalize_type(raw: Option<&str>) -> Option<String> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    Some(
        QuestionType::parse(raw)
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_else(|| raw.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_level_parses_any_case() {
        assert_eq!(BloomLevel::parse("remember"), Some(BloomLevel::Remember));
        assert_eq!(BloomLevel::parse(" ANALYZE "), Some(BloomLevel::Analyze));
        assert_eq!(BloomLevel::parse("Synthesis"), None);
    }

    #[test]
    fn question_type_accepts_loose_spelling() {
        assert_eq!(
            QuestionType::parse("Multiple Choice"),
            Some(QuestionType::MultipleChoice)
        );
        assert_eq!(
            QuestionType::parse("fill-in-blanks"),
            Some(QuestionType::FillInBlanks)
        );
        assert_eq!(QuestionType::parse("essay"), None);
    }

    #[test]
    fn options_decode_outcomes() {
        assert_eq!(DecodedOptions::decode(None), DecodedOptions::Absent);
        assert_eq!(DecodedOptions::decode(Some("  ")), DecodedOptions::Absent);
        assert_eq!(
            DecodedOptions::decode(Some("not json")),
            DecodedOptions::Malformed
        );
        assert_eq!(
            DecodedOptions::decode(Some(r#"["A","B"]"#)),
            DecodedOptions::Malformed
        );

        let parsed = DecodedOptions::decode(Some(r#"{"A":"Paris","B":"Rome"}"#));
        match parsed {
            DecodedOptions::Parsed(map) => {
                assert_eq!(map.get("A").map(String::as_str), Some("Paris"));
                assert_eq!(map.len(), 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn malformed_options_become_empty_map() {
        assert_eq!(
            DecodedOptions::Malformed.into_payload(),
            Some(OptionMap::new())
        );
        assert_eq!(DecodedOptions::Absent.into_payload(), None);
    }

    #[test]
    fn empty_option_map_is_not_stored() {
        assert_eq!(encode_options(Some(&OptionMap::new())), None);
        let mut map = OptionMap::new();
        map.insert("A".into(), "True".into());
        assert_eq!(encode_options(Some(&map)).as_deref(), Some(r#"{"A":"True"}"#));
    }

    #[test]
    fn levels_are_stored_capitalized() {
        assert_eq!(normalize_level(Some("apply")).as_deref(), Some("Apply"));
        assert_eq!(normalize_level(Some("  ")), None);
        assert_eq!(normalize_level(Some("Other")).as_deref(), Some("Other"));
        assert_eq!(
            normalize_type(Some("True False")).as_deref(),
            Some("true_false")
        );
    }
}
