//! Typed job payloads and the deterministic keys derived from them.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{error::DomainError, subjects::SubjectKey, types::JobType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePayload {
    pub subjects: Vec<SubjectKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub subjects: Vec<SubjectKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Job payload, one schema per [`JobType`].
///
/// Persisted as the bare inner object; the tag lives in the `job_type` column.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    MissionOrdersMerge(MergePayload),
    MissionOrdersEmail(EmailPayload),
}

impl JobPayload {
    pub fn new(job_type: JobType, subjects: Vec<SubjectKey>, message: Option<String>) -> Self {
        match job_type {
            JobType::MissionOrdersMerge => Self::MissionOrdersMerge(MergePayload { subjects }),
            JobType::MissionOrdersEmail => Self::MissionOrdersEmail(EmailPayload {
                subjects,
                message: message
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty()),
            }),
        }
    }

    pub fn job_type(&self) -> JobType {
        match self {
            Self::MissionOrdersMerge(_) => JobType::MissionOrdersMerge,
            Self::MissionOrdersEmail(_) => JobType::MissionOrdersEmail,
        }
    }

    /// Subjects in the order the caller requested them.
    pub fn subjects(&self) -> &[SubjectKey] {
        match self {
            Self::MissionOrdersMerge(payload) => &payload.subjects,
            Self::MissionOrdersEmail(payload) => &payload.subjects,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::MissionOrdersMerge(payload) => serde_json::to_value(payload),
            Self::MissionOrdersEmail(payload) => serde_json::to_value(payload),
        }
    }

    pub fn from_value(job_type: JobType, value: serde_json::Value) -> Result<Self, DomainError> {
        let parsed = match job_type {
            JobType::MissionOrdersMerge => {
                serde_json::from_value(value).map(Self::MissionOrdersMerge)
            }
            JobType::MissionOrdersEmail => {
                serde_json::from_value(value).map(Self::MissionOrdersEmail)
            }
        };
        parsed.map_err(|err| DomainError::MalformedPayload {
            job_type: job_type.as_str(),
            message: err.to_string(),
        })
    }
}

/// Dedupe key of a request: equivalent item sets collide regardless of order.
pub fn dedupe_key(job_type: JobType, subjects: &[SubjectKey]) -> String {
    let mut items: Vec<String> = subjects.iter().map(ToString::to_string).collect();
    items.sort();
    items.dedup();

    // serde_json maps are ordered, so the serialized object has sorted keys.
    let canonical = serde_json::json!({
        "items": items,
        "type": job_type.as_str(),
    });
    digest_base64(canonical.to_string().as_bytes())
}

/// Identity of a merged document: the exact ordered list of subjects.
pub fn batch_hash(subjects: &[SubjectKey]) -> String {
    let ordered: Vec<String> = subjects.iter().map(ToString::to_string).collect();
    digest_base64(serde_json::Value::from(ordered).to_string().as_bytes())
}

fn digest_base64(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    URL_SAFE_NO_PAD.encode(digest.as_slice())
}
