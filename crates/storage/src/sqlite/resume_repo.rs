use chrono::Utc;
use quiz_core::model::{AnswerSheet, QuizMode, ResumeFragment, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, i64_to_usize, ser, user_id_to_i64, usize_to_i64};
use crate::repository::{ResumeRepository, StorageError};

#[async_trait::async_trait]
impl ResumeRepository for SqliteRepository {
    async fn save_resume(
        &self,
        user: UserId,
        mode: QuizMode,
        fragment: &ResumeFragment,
    ) -> Result<(), StorageError> {
        let answers = serde_json::to_string(&fragment.answers).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO resume_states (user_id, mode, current_index, answers, saved_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, mode) DO UPDATE SET
                current_index = excluded.current_index,
                answers = excluded.answers,
                saved_at = excluded.saved_at
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(mode.as_str())
        .bind(usize_to_i64("current_index", fragment.current_index)?)
        .bind(answers)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_resume(
        &self,
        user: UserId,
        mode: QuizMode,
    ) -> Result<Option<ResumeFragment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT current_index, answers
            FROM resume_states
            WHERE user_id = ?1 AND mode = ?2
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(mode.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| -> Result<ResumeFragment, StorageError> {
            let index: i64 = row.try_get("current_index").map_err(ser)?;
            let answers: String = row.try_get("answers").map_err(ser)?;
            Ok(ResumeFragment {
                current_index: i64_to_usize("current_index", index)?,
                answers: serde_json::from_str::<AnswerSheet>(&answers).map_err(ser)?,
            })
        })
        .transpose()
    }

    async fn clear_resume(&self, user: UserId, mode: QuizMode) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM resume_states WHERE user_id = ?1 AND mode = ?2")
            .bind(user_id_to_i64(user)?)
            .bind(mode.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
