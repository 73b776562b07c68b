//! PostgreSQL implementation of ConsultationArchive.
//!
//! Each reviewed exchange becomes one `questions` row and one `answers` row,
//! written in a single transaction.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{ArchivedExchange, ConsultationArchive};

#[derive(Clone)]
pub struct PostgresConsultationArchive {
    pool: PgPool,
}

impl PostgresConsultationArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl ConsultationArchive for PostgresConsultationArchive {
    async fn archive(&self, exchange: ArchivedExchange) -> Result<(), DomainError> {
        let question_id = Uuid::new_v4();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("Failed to begin transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO questions (
                id, session_id, question_text, status, answered_at, answered_by
            ) VALUES ($1, $2, $3, 'ANSWERED', $4, $5)
            "#,
        )
        .bind(question_id)
        .bind(exchange.session_id.as_uuid())
        .bind(&exchange.question)
        .bind(exchange.reviewed_at.as_datetime())
        .bind(&exchange.reviewer)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert question", e))?;

        sqlx::query(
            r#"
            INSERT INTO answers (
                id, question_id, draft_id, reviewer, answer_text,
                ai_draft_answer, ai_confidence, ai_references, review_status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(exchange.draft_id.map(|id| *id.as_uuid()))
        .bind(&exchange.reviewer)
        .bind(&exchange.final_answer)
        .bind(&exchange.ai_draft)
        .bind(exchange.ai_confidence)
        .bind(&exchange.ai_references)
        .bind(exchange.review_status.as_str())
        .bind(exchange.reviewed_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to insert answer", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Failed to commit archive", e))?;

        tracing::debug!(
            session_id = %exchange.session_id,
            question_id = %question_id,
            review_status = exchange.review_status.as_str(),
            "Exchange archived"
        );
        Ok(())
    }
}
