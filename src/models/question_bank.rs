use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuestionBank {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub question_count: i64,
}

impl QuestionBank {
    pub fn ensure_owned_by(&self, owner_id: &str) -> Result<()> {
        if self.owner_id == owner_id {
            Ok(())
        } else {
            Err(Error::Forbidden("Not enough permissions".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(owner: &str) -> QuestionBank {
        QuestionBank {
            id: 1,
            name: "Biology".into(),
            description: None,
            owner_id: owner.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            question_count: 0,
        }
    }

    #[test]
    fn owner_passes_and_stranger_is_forbidden() {
        let bank = bank("alice");
        assert!(bank.ensure_owned_by("alice").is_ok());
        assert!(matches!(
            bank.ensure_owned_by("bob"),
            Err(Error::Forbidden(_))
        ));
    }
}
