//! Examination assembly: resolve a candidate id list, check the two quotas
//! against each other, then draw questions per Bloom level.
//!
//! Only the level quota drives selection. The type quota takes part in the
//! up-front total check and the type breakdown is logged, but no type is
//! ever enforced on the drawn set.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dto::examination_dto::{ExaminationRequest, Quota};
use crate::error::Result;
use crate::models::question::{BloomLevel, OptionMap, Question};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExaminationError {
    #[error("No questions selected")]
    NoQuestionsSelected,

    #[error(
        "Total questions by Bloom level ({by_level}) must match total by question type ({by_type})"
    )]
    QuotaMismatch { by_level: u64, by_type: u64 },

    #[error("No valid questions found")]
    NoValidQuestions,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Question),
    Missing(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExaminationQuestion {
    pub id: i64,
    pub question: String,
    pub answer: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionMap>,
}

impl From<Question> for ExaminationQuestion {
    fn from(q: Question) -> Self {
        let options = q.decoded_options().into_payload();
        Self {
            id: q.id,
            question: q.question,
            answer: q.answer,
            level: q.level,
            question_type: q.question_type,
            options,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Examination {
    pub title: String,
    pub questions: Vec<ExaminationQuestion>,
    pub total_questions: usize,
}

pub fn check_request(request: &ExaminationRequest) -> std::result::Result<(), ExaminationError> {
    if request.question_ids.is_empty() {
        return Err(ExaminationError::NoQuestionsSelected);
    }

    let by_level = request.bloom_levels.total();
    let by_type = request.question_types.total();
    if by_level != by_type {
        return Err(ExaminationError::QuotaMismatch { by_level, by_type });
    }

    Ok(())
}

/// Each distinct id is looked up once, in first-seen order.
pub async fn resolve_questions<S>(store: &S, ids: &[i64]) -> Result<Vec<Resolution>>
where
    S: QuestionStore + ?Sized,
{
    let mut seen = HashSet::with_capacity(ids.len());
    let mut resolved = Vec::with_capacity(ids.len());

    for &id in ids {
        if !seen.insert(id) {
            continue;
        }
        match store.get_by_id(id).await? {
            Some(question) => resolved.push(Resolution::Found(question)),
            None => resolved.push(Resolution::Missing(id)),
        }
    }

    Ok(resolved)
}

/// Draws `min(count, pool)` questions per requested level, uniformly and
/// without replacement. Output is grouped in quota order.
pub fn select_questions<R>(candidates: Vec<Question>, level_quota: &Quota, rng: &mut R) -> Vec<Question>
where
    R: Rng + ?Sized,
{
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut pools: HashMap<BloomLevel, Vec<Question>> = HashMap::new();

    for question in candidates {
        let type_key = question
            .kind()
            .map(|kind| kind.as_str().to_string())
            .unwrap_or_else(|| "untyped".to_string());
        *by_type.entry(type_key).or_default() += 1;

        if let Some(level) = question.bloom_level() {
            pools.entry(level).or_default().push(question);
        }
    }

    tracing::debug!(?by_type, "candidate questions by type");

    let mut selected = Vec::new();
    for (key, requested) in level_quota.entries() {
        let Some(pool) = BloomLevel::parse(key).and_then(|level| pools.get_mut(&level)) else {
            tracing::debug!(level = key, requested, "no candidates for level");
            continue;
        };

        let amount = (requested as usize).min(pool.len());
        if amount == 0 {
            continue;
        }

        let mut picked = rand::seq::index::sample(&mut *rng, pool.len(), amount).into_vec();
        selected.extend(picked.iter().map(|&idx| pool[idx].clone()));

        // Drawn questions leave the pool in case another key maps to the same level.
        picked.sort_unstable_by(|a, b| b.cmp(a));
        for idx in picked {
            pool.swap_remove(idx);
        }
    }

    selected
}

pub async fn assemble<S, R>(
    store: &S,
    request: &ExaminationRequest,
    rng: &mut R,
) -> Result<Examination>
where
    S: QuestionStore + ?Sized,
    R: Rng + ?Sized,
{
    check_request(request)?;

    let resolutions = resolve_questions(store, &request.question_ids).await?;
    let mut candidates = Vec::with_capacity(resolutions.len());
    let mut missing = Vec::new();
    for resolution in resolutions {
        match resolution {
            Resolution::Found(question) => candidates.push(question),
            Resolution::Missing(id) => missing.push(id),
        }
    }

    if !missing.is_empty() {
        tracing::info!(?missing, "skipping unknown question ids");
    }
    if candidates.is_empty() {
        return Err(ExaminationError::NoValidQuestions.into());
    }

    let questions: Vec<ExaminationQuestion> = select_questions(candidates, &request.bloom_levels, rng)
        .into_iter()
        .map(ExaminationQuestion::from)
        .collect();

    tracing::info!(
        title = %request.title,
        requested = request.bloom_levels.total(),
        selected = questions.len(),
        "examination assembled"
    );

    Ok(Examination {
        title: request.title.clone(),
        total_questions: questions.len(),
        questions,
    })
}

#[derive(Clone)]
pub struct ExaminationService<S> {
    store: S,
}

impl<S: QuestionStore> ExaminationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: &ExaminationRequest) -> Result<Examination> {
        let mut rng = StdRng::from_entropy();
        assemble(&self.store, request, &mut rng).await
    }
}
