use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("exam question count must be > 0")]
    InvalidExamSize,

    #[error("exam duration must be > 0 seconds")]
    InvalidExamDuration,

    #[error("resume save debounce must be > 0 ms")]
    InvalidResumeDebounce,
}

/// Tunables of the quiz engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    exam_size: usize,
    exam_duration_secs: u32,
    resume_debounce_ms: u64,
}

impl Default for QuizSettings {
    /// 100 questions, 150 minutes, 800 ms save debounce.
    fn default() -> Self {
        Self {
            exam_size: 100,
            exam_duration_secs: 9_000,
            resume_debounce_ms: 800,
        }
    }
}

impl QuizSettings {
    /// Creates custom settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any value is zero.
    pub fn new(
        exam_size: usize,
        exam_duration_secs: u32,
        resume_debounce_ms: u64,
    ) -> Result<Self, SettingsError> {
        if exam_size == 0 {
            return Err(SettingsError::InvalidExamSize);
        }
        if exam_duration_secs == 0 {
            return Err(SettingsError::InvalidExamDuration);
        }
        if resume_debounce_ms == 0 {
            return Err(SettingsError::InvalidResumeDebounce);
        }
        Ok(Self {
            exam_size,
            exam_duration_secs,
            resume_debounce_ms,
        })
    }

    #[must_use]
    pub fn exam_size(&self) -> usize {
        self.exam_size
    }

    #[must_use]
    pub fn exam_duration_secs(&self) -> u32 {
        self.exam_duration_secs
    }

    #[must_use]
    pub fn resume_debounce_ms(&self) -> u64 {
        self.resume_debounce_ms
    }
}
