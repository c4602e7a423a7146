use async_trait::async_trait;
use sqlx::PgPool;

use crate::dto::question_dto::{
    CreateQuestionPayload, GeneratedQuestion, QuestionListQuery, UpdateQuestionPayload,
};
use crate::error::{Error, Result};
use crate::models::question::{encode_options, normalize_level, normalize_type, Question};
use crate::services::examination_service::QuestionStore;

const QUESTION_COLUMNS: &str =
    "id, question, answer, level, question_type, options, context, bank_id, created_at, updated_at";

#[derive(Clone)]
pub struct QuestionService {
    pool: PgPool,
}

impl QuestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, payload: CreateQuestionPayload) -> Result<Question> {
        let question = payload.question.trim();
        if question.is_empty() {
            return Err(Error::BadRequest("Question text must not be empty".to_string()));
        }

        let row = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions (question, answer, level, question_type, options, context, bank_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(question)
        .bind(payload.answer)
        .bind(normalize_level(payload.level.as_deref()))
        .bind(normalize_type(payload.question_type.as_deref()))
        .bind(encode_options(payload.options.as_ref()))
        .bind(payload.context)
        .bind(payload.bank_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Stores a freshly generated batch in one transaction, keeping input order.
    pub async fn create_generated(&self, generated: &[GeneratedQuestion]) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(generated.len());

        for q in generated {
            let row = sqlx::query_as::<_, Question>(&format!(
                r#"
                INSERT INTO questions (question, answer, level, question_type, options, context)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {QUESTION_COLUMNS}
                "#
            ))
            .bind(&q.question)
            .bind(&q.answer)
            .bind(normalize_level(q.level.as_deref()))
            .bind(normalize_type(q.question_type.as_deref()))
            .bind(encode_options(q.options.as_ref()))
            .bind(&q.context)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, id: i64) -> Result<Question> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Question {} not found", id)))
    }

    pub async fn list(&self, query: &QuestionListQuery) -> Result<Vec<Question>> {
        let (skip, limit) = query.paging();
        let level = normalize_level(query.level.as_deref());
        let question_type = normalize_type(query.question_type.as_deref());

        let rows = sqlx::query_as::<_, Question>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE ($1::text IS NULL OR level = $1)
              AND ($2::text IS NULL OR question_type = $2)
              AND ($3::bigint IS NULL OR bank_id = $3)
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(level)
        .bind(question_type)
        .bind(query.bank_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_by_bank(&self, bank_id: i64, skip: i64, limit: i64) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, Question>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE bank_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(bank_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update(&self, id: i64, payload: UpdateQuestionPayload) -> Result<Question> {
        let existing = self.get(id).await?;

        let options = match payload.options.as_ref() {
            Some(map) => encode_options(Some(map)),
            None => existing.options,
        };
        let bank_id = match payload.bank_id {
            Some(target) => target,
            None => existing.bank_id,
        };

        let row = sqlx::query_as::<_, Question>(&format!(
            r#"
            UPDATE questions
            SET
                question = COALESCE($2, question),
                answer = COALESCE($3, answer),
                level = COALESCE($4, level),
                question_type = COALESCE($5, question_type),
                options = $6,
                bank_id = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(payload.question)
        .bind(payload.answer)
        .bind(normalize_level(payload.level.as_deref()))
        .bind(normalize_type(payload.question_type.as_deref()))
        .bind(options)
        .bind(bank_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl QuestionStore for QuestionService {
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        self.find(id).await
    }
}
