use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Caller input that can never be accepted as-is.
    #[error("{message}")]
    Validation { message: String },
    #[error("stored payload for `{job_type}` is malformed: {message}")]
    MalformedPayload {
        job_type: &'static str,
        message: String,
    },
    /// Mission data that cannot be turned into a rendering input or public view.
    #[error("mission data is unusable: {message}")]
    MissionData { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn mission_data(message: impl Into<String>) -> Self {
        Self::MissionData {
            message: message.into(),
        }
    }
}
