use chrono::Utc;
use quiz_core::model::{UserId, UserProgress};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ids_from_json, ids_to_json, ser, user_id_to_i64, usize_to_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn save_progress(
        &self,
        user: UserId,
        progress: &UserProgress,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_progress (
                user_id, answered_ids, wrong_ids, total_answered, total_wrong, accuracy, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(user_id) DO UPDATE SET
                answered_ids = excluded.answered_ids,
                wrong_ids = excluded.wrong_ids,
                total_answered = excluded.total_answered,
                total_wrong = excluded.total_wrong,
                accuracy = excluded.accuracy,
                last_updated = excluded.last_updated
            ",
        )
        .bind(user_id_to_i64(user)?)
        .bind(ids_to_json(progress.answered.iter())?)
        .bind(ids_to_json(progress.mistakes.iter())?)
        .bind(usize_to_i64("total_answered", progress.answered.len())?)
        .bind(usize_to_i64("total_wrong", progress.mistakes.len())?)
        .bind(progress.accuracy())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_progress(&self, user: UserId) -> Result<UserProgress, StorageError> {
        let row = sqlx::query(
            r"
            SELECT answered_ids, wrong_ids
            FROM user_progress
            WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(UserProgress::default());
        };

        let answered: String = row.try_get("answered_ids").map_err(ser)?;
        let wrong: String = row.try_get("wrong_ids").map_err(ser)?;
        Ok(UserProgress::new(
            ids_from_json(&answered)?.into_iter().collect(),
            ids_from_json(&wrong)?.into_iter().collect(),
        ))
    }
}
