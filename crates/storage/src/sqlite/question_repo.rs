use chrono::Utc;
use quiz_core::model::{Question, QuestionId};

use super::SqliteRepository;
use super::mapping::{conn, map_question_row, options_to_json, question_id_to_i64, usize_to_i64};
use crate::repository::{QuestionCatalog, QuestionRecord, QuestionSource, StorageError};

#[async_trait::async_trait]
impl QuestionSource for SqliteRepository {
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, category, question, options, correct_answer, explanation, kind
            FROM questions
            ORDER BY position ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let records = rows
            .iter()
            .map(map_question_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuestionRecord::decode_all(records))
    }
}

#[async_trait::async_trait]
impl QuestionCatalog for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let record = QuestionRecord::from_question(question);
        sqlx::query(
            r"
            INSERT INTO questions (
                id, position, category, question, options, correct_answer, explanation, kind, updated_at
            )
            VALUES (
                ?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM questions),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8
            )
            ON CONFLICT(id) DO UPDATE SET
                -- position stays where the question was first inserted
                category = excluded.category,
                question = excluded.question,
                options = excluded.options,
                correct_answer = excluded.correct_answer,
                explanation = excluded.explanation,
                kind = excluded.kind,
                updated_at = excluded.updated_at
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(&record.category)
        .bind(&record.question)
        .bind(options_to_json(&record)?)
        .bind(&record.correct_answer)
        .bind(&record.explanation)
        .bind(&record.kind)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(question_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_all(&self, questions: &[Question]) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM questions")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.iter().enumerate() {
            let record = QuestionRecord::from_question(question);
            sqlx::query(
                r"
                INSERT INTO questions (
                    id, position, category, question, options, correct_answer, explanation, kind, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    category = excluded.category,
                    question = excluded.question,
                    options = excluded.options,
                    correct_answer = excluded.correct_answer,
                    explanation = excluded.explanation,
                    kind = excluded.kind,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(question_id_to_i64(question.id())?)
            .bind(usize_to_i64("position", position)?)
            .bind(&record.category)
            .bind(&record.question)
            .bind(options_to_json(&record)?)
            .bind(&record.correct_answer)
            .bind(&record.explanation)
            .bind(&record.kind)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
