use quiz_core::model::{QuestionId, UserId};
use sqlx::Row;

use crate::repository::{OptionRecord, QuestionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    u64_to_i64("question_id", id.value())
}

pub(crate) fn user_id_to_i64(id: UserId) -> Result<i64, StorageError> {
    u64_to_i64("user_id", id.value())
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Id lists are stored as JSON arrays of integers.
pub(crate) fn ids_to_json(ids: impl Iterator<Item = QuestionId>) -> Result<String, StorageError> {
    let raw: Vec<u64> = ids.map(|id| id.value()).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn ids_from_json(raw: &str) -> Result<Vec<QuestionId>, StorageError> {
    let ids: Vec<u64> = serde_json::from_str(raw).map_err(ser)?;
    Ok(ids.into_iter().map(QuestionId::new).collect())
}

pub(crate) fn options_to_json(record: &QuestionRecord) -> Result<String, StorageError> {
    serde_json::to_string(&record.options).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionRecord, StorageError> {
    let options_raw: String = row.try_get("options").map_err(ser)?;
    let options: Vec<OptionRecord> = serde_json::from_str(&options_raw).map_err(ser)?;

    Ok(QuestionRecord {
        id: i64_to_u64("id", row.try_get("id").map_err(ser)?)?,
        category: row.try_get("category").map_err(ser)?,
        question: row.try_get("question").map_err(ser)?,
        options,
        correct_answer: row.try_get("correct_answer").map_err(ser)?,
        explanation: row.try_get("explanation").map_err(ser)?,
        kind: row.try_get("kind").map_err(ser)?,
    })
}
