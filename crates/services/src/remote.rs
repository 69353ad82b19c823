use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{BankEvent, Question, QuestionId, UserId, UserProgress};
use storage::repository::{ProgressRepository, QuestionRecord, QuestionSource, StorageError};

use crate::error::RemoteError;

/// Client for the quiz REST API: bank provider and progress store.
#[derive(Clone)]
pub struct RemoteQuizApi {
    client: Client,
    base_url: String,
}

impl RemoteQuizApi {
    /// `base_url` is the API root, e.g. `http://localhost:3001/api`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    /// `GET /questions`. Invalid records are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure, a non-success status, or
    /// `success: false`.
    pub async fn fetch_questions(&self) -> Result<Vec<Question>, RemoteError> {
        let response = self.client.get(self.url("questions")).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let body: QuestionsResponse = response.json().await?;
        check(body.success, body.message)?;
        Ok(QuestionRecord::decode_all(body.questions))
    }

    /// `POST /progress`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    pub async fn save_progress(
        &self,
        user: UserId,
        progress: &UserProgress,
    ) -> Result<(), RemoteError> {
        let payload = SaveProgressRequest {
            user_id: user.value(),
            answered_ids: progress.answered.iter().map(|id| id.value()).collect(),
            wrong_ids: progress.mistakes.iter().map(|id| id.value()).collect(),
        };
        let response = self
            .client
            .post(self.url("progress"))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let body: Ack = response.json().await?;
        check(body.success, body.message)
    }

    /// `GET /progress/{userId}`. A user with no saved progress gets empty sets.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` on transport failure or rejection.
    pub async fn load_progress(&self, user: UserId) -> Result<UserProgress, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("progress/{user}")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let body: ProgressResponse = response.json().await?;
        check(body.success, body.message)?;
        Ok(body.progress.map(RemoteProgress::into_progress).unwrap_or_default())
    }

    /// `POST /error-reports`: flag a question as wrong, optionally with the
    /// answer the user believes is correct.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::EmptyReport` for a blank description without
    /// contacting the server, otherwise `RemoteError` on transport failure or
    /// rejection.
    pub async fn report_error(
        &self,
        user: UserId,
        question: &Question,
        suggested_answer: Option<&str>,
        description: &str,
    ) -> Result<(), RemoteError> {
        let payload = ErrorReportRequest::new(user, question, suggested_answer, description)?;
        let response = self
            .client
            .post(self.url("error-reports"))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let body: Ack = response.json().await?;
        check(body.success, body.message)?;
        tracing::info!(user.id = %user, question.id = %question.id(), "error report sent");
        Ok(())
    }
}

fn check(success: bool, message: Option<String>) -> Result<(), RemoteError> {
    if success {
        Ok(())
    } else {
        Err(RemoteError::Rejected(
            message.unwrap_or_else(|| "request failed".to_string()),
        ))
    }
}

#[async_trait]
impl QuestionSource for RemoteQuizApi {
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError> {
        Ok(self.fetch_questions().await?)
    }
}

#[async_trait]
impl ProgressRepository for RemoteQuizApi {
    async fn save_progress(
        &self,
        user: UserId,
        progress: &UserProgress,
    ) -> Result<(), StorageError> {
        Ok(RemoteQuizApi::save_progress(self, user, progress).await?)
    }

    async fn load_progress(&self, user: UserId) -> Result<UserProgress, StorageError> {
        Ok(RemoteQuizApi::load_progress(self, user).await?)
    }
}

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    questions: Vec<QuestionRecord>,
}

#[derive(Debug, Deserialize)]
struct ProgressResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    progress: Option<RemoteProgress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteProgress {
    #[serde(default)]
    answered_ids: Vec<u64>,
    #[serde(default)]
    wrong_ids: Vec<u64>,
}

impl RemoteProgress {
    fn into_progress(self) -> UserProgress {
        UserProgress::new(
            self.answered_ids.into_iter().map(QuestionId::new).collect(),
            self.wrong_ids.into_iter().map(QuestionId::new).collect(),
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveProgressRequest {
    user_id: u64,
    answered_ids: Vec<u64>,
    wrong_ids: Vec<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReportRequest {
    question_id: u64,
    question: String,
    current_answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_answer: Option<String>,
    description: String,
    user_id: String,
}

impl ErrorReportRequest {
    fn new(
        user: UserId,
        question: &Question,
        suggested_answer: Option<&str>,
        description: &str,
    ) -> Result<Self, RemoteError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RemoteError::EmptyReport);
        }
        Ok(Self {
            question_id: question.id().value(),
            question: question.text().to_string(),
            current_answer: question.correct_answer().to_string(),
            suggested_answer: suggested_answer
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            description: description.to_string(),
            user_id: user.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct Ack {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

//
// ─── PUSH MESSAGES ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum BankPush {
    QuestionAdded {
        question: QuestionRecord,
    },
    QuestionUpdated {
        question: QuestionRecord,
    },
    QuestionDeleted {
        #[serde(rename = "questionId")]
        question_id: u64,
    },
    QuestionBankUpdated {},
}

const BANK_PUSH_TYPES: [&str; 4] = [
    "QUESTION_ADDED",
    "QUESTION_UPDATED",
    "QUESTION_DELETED",
    "QUESTION_BANK_UPDATED",
];

/// Decode a broadcast message into a bank change.
///
/// Messages about anything other than the bank yield `None`, as do malformed
/// bank messages, which are logged.
#[must_use]
pub fn decode_push_message(raw: &str) -> Option<BankEvent> {
    let envelope: PushEnvelope = match serde_json::from_str(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable push message");
            return None;
        }
    };
    if !BANK_PUSH_TYPES.contains(&envelope.kind.as_str()) {
        tracing::trace!(kind = %envelope.kind, "ignoring non-bank push message");
        return None;
    }

    let push: BankPush = match serde_json::from_str(raw) {
        Ok(push) => push,
        Err(e) => {
            tracing::warn!(kind = %envelope.kind, error = %e, "malformed bank push message");
            return None;
        }
    };

    let validated = |record: QuestionRecord| {
        let id = record.id;
        record
            .into_question()
            .map_err(|e| tracing::warn!(question.id = id, error = %e, "pushed question is invalid"))
            .ok()
    };

    match push {
        BankPush::QuestionAdded { question } => validated(question).map(BankEvent::Added),
        BankPush::QuestionUpdated { question } => validated(question).map(BankEvent::Updated),
        BankPush::QuestionDeleted { question_id } => {
            Some(BankEvent::Deleted(QuestionId::new(question_id)))
        }
        BankPush::QuestionBankUpdated {} => Some(BankEvent::ReplacedAll),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_each_bank_message() {
        let added = r#"{"type":"QUESTION_ADDED","question":{"id":8,"question":"New?",
            "options":[{"id":"A","text":"yes"},{"id":"B","text":"no"}],"correctAnswer":"A"}}"#;
        match decode_push_message(added) {
            Some(BankEvent::Added(q)) => {
                assert_eq!(q.id(), QuestionId::new(8));
                assert_eq!(q.category(), "Uncategorized");
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            decode_push_message(r#"{"type":"QUESTION_DELETED","questionId":3}"#),
            Some(BankEvent::Deleted(QuestionId::new(3)))
        );
        assert_eq!(
            decode_push_message(r#"{"type":"QUESTION_BANK_UPDATED","count":120}"#),
            Some(BankEvent::ReplacedAll)
        );
    }

    #[test]
    fn ignores_unrelated_and_malformed_messages() {
        assert_eq!(
            decode_push_message(r#"{"type":"ANNOUNCEMENT_UPDATED","announcement":{}}"#),
            None
        );
        assert_eq!(decode_push_message(r#"{"type":"QUESTION_DELETED"}"#), None);
        assert_eq!(decode_push_message("not json"), None);
        let invalid = r#"{"type":"QUESTION_UPDATED","question":{"id":1,"question":"x",
            "options":[{"id":"A","text":"only"}],"correctAnswer":"A"}}"#;
        assert_eq!(decode_push_message(invalid), None);
    }

    #[test]
    fn rejection_carries_server_message() {
        let body: Ack = serde_json::from_str(r#"{"success":false,"message":"no such user"}"#).unwrap();
        let err = check(body.success, body.message).unwrap_err();
        assert!(matches!(err, RemoteError::Rejected(m) if m == "no such user"));
    }

    #[test]
    fn missing_progress_is_empty() {
        let body: ProgressResponse = serde_json::from_str(
            r#"{"success":true,"progress":{"userId":"4","answeredIds":[1,2],"wrongIds":[2],"accuracy":"50.0"}}"#,
        )
        .unwrap();
        let progress = body.progress.map(RemoteProgress::into_progress).unwrap();
        assert_eq!(progress.answered.len(), 2);
        assert!(progress.mistakes.contains(QuestionId::new(2)));

        let empty: ProgressResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(empty.progress.is_none());
    }

    #[test]
    fn error_report_carries_question_and_trimmed_text() {
        let record: QuestionRecord = serde_json::from_str(
            r#"{"id":5,"question":"Which port does MQTT use?",
            "options":[{"id":"A","text":"1883"},{"id":"B","text":"80"}],"correctAnswer":"A"}"#,
        )
        .unwrap();
        let question = record.into_question().unwrap();

        let report =
            ErrorReportRequest::new(UserId::new(4), &question, Some(" B "), "  outdated  ").unwrap();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({
                "questionId": 5,
                "question": "Which port does MQTT use?",
                "currentAnswer": "A",
                "suggestedAnswer": "B",
                "description": "outdated",
                "userId": "4",
            })
        );

        let without = ErrorReportRequest::new(UserId::new(4), &question, Some(""), "typo").unwrap();
        assert!(serde_json::to_value(&without).unwrap().get("suggestedAnswer").is_none());

        assert!(matches!(
            ErrorReportRequest::new(UserId::new(4), &question, None, "   "),
            Err(RemoteError::EmptyReport)
        ));
    }

    #[test]
    fn builds_urls_without_double_slashes() {
        let api = RemoteQuizApi::new("http://localhost:3001/api/");
        assert_eq!(api.url("questions"), "http://localhost:3001/api/questions");
    }
}
