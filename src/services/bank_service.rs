use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashSet;

use crate::dto::bank_dto::{CreateBankPayload, UpdateBankPayload};
use crate::dto::question_dto::SaveToBankPayload;
use crate::error::{Error, Result};
use crate::models::question_bank::QuestionBank;

const BANK_COLUMNS: &str = r#"
    b.id, b.name, b.description, b.owner_id, b.created_at, b.updated_at,
    (SELECT COUNT(*) FROM questions q WHERE q.bank_id = b.id) AS question_count
"#;

/// Per-id result of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Updated(i64),
    Skipped(i64),
}

#[derive(Debug, Clone)]
pub struct MembershipReport {
    pub bank_id: i64,
    pub bank_name: String,
    pub changes: Vec<MembershipChange>,
}

impl MembershipReport {
    pub fn updated_count(&self) -> usize {
        self.changes
            .iter()
            .filter(|change| matches!(change, MembershipChange::Updated(_)))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = i64> + '_ {
        self.changes.iter().filter_map(|change| match change {
            MembershipChange::Skipped(id) => Some(*id),
            MembershipChange::Updated(_) => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Add,
    Remove,
}

#[derive(Clone)]
pub struct BankService {
    pool: PgPool,
}

impl BankService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_owner(&self, owner_id: &str, skip: i64, limit: i64) -> Result<Vec<QuestionBank>> {
        let banks = sqlx::query_as::<_, QuestionBank>(&format!(
            r#"
            SELECT {BANK_COLUMNS}
            FROM question_banks b
            WHERE b.owner_id = $1
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(banks)
    }

    pub async fn find(&self, id: i64) -> Result<Option<QuestionBank>> {
        let bank = sqlx::query_as::<_, QuestionBank>(&format!(
            "SELECT {BANK_COLUMNS} FROM question_banks b WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bank)
    }

    /// Resolves the bank and checks ownership; nothing is mutated on failure.
    pub async fn get_owned(&self, id: i64, owner_id: &str) -> Result<QuestionBank> {
        let bank = self
            .find(id)
            .await?
            .ok_or_else(|| Error::NotFound("Question bank not found".to_string()))?;
        bank.ensure_owned_by(owner_id)?;
        Ok(bank)
    }

    async fn name_taken(&self, owner_id: &str, name: &str, except: Option<i64>) -> Result<bool> {
        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM question_banks
            WHERE owner_id = $1 AND name = $2 AND ($3::bigint IS NULL OR id <> $3)
            "#,
        )
        .bind(owner_id)
        .bind(name)
        .bind(except)
        .fetch_optional(&self.pool)
        .await?;
        Ok(existing.is_some())
    }

    pub async fn create(&self, owner_id: &str, payload: CreateBankPayload) -> Result<QuestionBank> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(Error::BadRequest("Bank name must not be empty".to_string()));
        }
        if self.name_taken(owner_id, name, None).await? {
            return Err(Error::BadRequest(format!(
                "A question bank with the name '{}' already exists",
                name
            )));
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO question_banks (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(payload.description)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(bank_id = id, owner = owner_id, "question bank created");
        self.get_owned(id, owner_id).await
    }

    pub async fn update(&self, id: i64, owner_id: &str, payload: UpdateBankPayload) -> Result<QuestionBank> {
        self.get_owned(id, owner_id).await?;

        if let Some(name) = payload.name.as_deref() {
            if self.name_taken(owner_id, name, Some(id)).await? {
                return Err(Error::BadRequest(format!(
                    "A question bank with the name '{}' already exists",
                    name
                )));
            }
        }

        sqlx::query(
            r#"
            UPDATE question_banks
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(payload.name)
        .bind(payload.description)
        .execute(&self.pool)
        .await?;

        self.get_owned(id, owner_id).await
    }

    /// Unbanks the bank's questions, then removes the bank, in one transaction.
    pub async fn delete(&self, id: i64, owner_id: &str) -> Result<QuestionBank> {
        let bank = self.get_owned(id, owner_id).await?;

        let mut tx = self.pool.begin().await?;
        let released = sqlx::query("UPDATE questions SET bank_id = NULL, updated_at = NOW() WHERE bank_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM question_banks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(bank_id = id, released, "question bank deleted");
        Ok(bank)
    }

    pub async fn add_questions(&self, bank_id: i64, owner_id: &str, question_ids: &[i64]) -> Result<MembershipReport> {
        self.change_membership(bank_id, owner_id, question_ids, Membership::Add)
            .await
    }

    pub async fn remove_questions(&self, bank_id: i64, owner_id: &str, question_ids: &[i64]) -> Result<MembershipReport> {
        self.change_membership(bank_id, owner_id, question_ids, Membership::Remove)
            .await
    }

    /// Files questions into an existing bank, or into a new one created from `bank_name`.
    pub async fn save_to_bank(&self, owner_id: &str, payload: SaveToBankPayload) -> Result<MembershipReport> {
        if payload.question_ids.is_empty() {
            return Err(Error::BadRequest("No questions selected".to_string()));
        }

        let bank_id = match (payload.bank_id, payload.bank_name) {
            (Some(id), _) => id,
            (None, Some(name)) => {
                let bank = self
                    .create(
                        owner_id,
                        CreateBankPayload {
                            name,
                            description: None,
                        },
                    )
                    .await?;
                bank.id
            }
            (None, None) => {
                return Err(Error::BadRequest(
                    "Either bank_id or bank_name must be provided".to_string(),
                ))
            }
        };

        self.add_questions(bank_id, owner_id, &payload.question_ids)
            .await
    }

    async fn change_membership(
        &self,
        bank_id: i64,
        owner_id: &str,
        question_ids: &[i64],
        direction: Membership,
    ) -> Result<MembershipReport> {
        let bank = self.get_owned(bank_id, owner_id).await?;

        let mut tx = self.pool.begin().await?;
        let mut changes = Vec::with_capacity(question_ids.len());
        for id in distinct(question_ids) {
            let touched = match direction {
                Membership::Add => assign(&mut tx, id, bank_id).await?,
                Membership::Remove => release(&mut tx, id, bank_id).await?,
            };
            changes.push(if touched {
                MembershipChange::Updated(id)
            } else {
                MembershipChange::Skipped(id)
            });
        }
        tx.commit().await?;

        let report = MembershipReport {
            bank_id,
            bank_name: bank.name,
            changes,
        };
        tracing::info!(
            bank_id,
            ?direction,
            updated = report.updated_count(),
            skipped = ?report.skipped().collect::<Vec<_>>(),
            "bank membership changed"
        );
        Ok(report)
    }
}

async fn assign(tx: &mut Transaction<'_, Postgres>, question_id: i64, bank_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE questions SET bank_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(question_id)
        .bind(bank_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn release(tx: &mut Transaction<'_, Postgres>, question_id: i64, bank_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE questions SET bank_id = NULL, updated_at = NOW() WHERE id = $1 AND bank_id = $2",
    )
    .bind(question_id)
    .bind(bank_id)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// First occurrence wins; order is preserved.
fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keeps_first_occurrence_order() {
        assert_eq!(distinct(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(distinct(&[]).is_empty());
    }

    #[test]
    fn report_counts_only_updates() {
        let report = MembershipReport {
            bank_id: 4,
            bank_name: "Chemistry".into(),
            changes: vec![
                MembershipChange::Updated(1),
                MembershipChange::Skipped(2),
                MembershipChange::Updated(3),
            ],
        };
        assert_eq!(report.updated_count(), 2);
        assert_eq!(report.skipped().collect::<Vec<_>>(), vec![2]);
    }
}
