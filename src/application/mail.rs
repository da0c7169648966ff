//! Outbound delivery of mission orders.
//!
//! The transport is an idempotent sink from the worker's point of view: a reclaimed
//! or retried job may send the same order again.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::mission::MissionSource;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery is not configured")]
    Disabled,
    #[error("official `{0}` has no email address")]
    NoRecipient(String),
    #[error("invalid address `{0}`")]
    Address(String),
    #[error("message could not be built: {0}")]
    Build(String),
    #[error("transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct MissionOrderMail {
    pub to: String,
    pub recipient_name: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub pdf: Bytes,
}

impl MissionOrderMail {
    /// Build the message for one official, with an optional note from the sender.
    pub fn for_mission(
        source: &MissionSource,
        sequence_number: i64,
        note: Option<&str>,
        pdf: Bytes,
    ) -> Result<Self, MailError> {
        let to = source
            .official_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| MailError::NoRecipient(source.subject.to_string()))?
            .to_string();

        let fixture = format!("{} - {}", source.home_team.trim(), source.away_team.trim());
        let mut body = format!(
            "{},\n\nPlease find attached your mission order for {} ({}).\n",
            source.official_name.trim(),
            fixture,
            source.competition.trim()
        );
        if let Some(note) = note.map(str::trim).filter(|note| !note.is_empty()) {
            body.push('\n');
            body.push_str(note);
            body.push('\n');
        }

        Ok(Self {
            to,
            recipient_name: source.official_name.trim().to_string(),
            subject: format!("Mission order: {fixture}"),
            body,
            attachment_name: format!("mission-order-{sequence_number:08}.pdf"),
            pdf,
        })
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: MissionOrderMail) -> Result<(), MailError>;
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;
    use crate::domain::subjects::SubjectKey;

    fn source(email: Option<&str>) -> MissionSource {
        MissionSource {
            subject: SubjectKey::parse("m1:o1").expect("valid key"),
            official_name: "Karim Benali".to_string(),
            official_email: email.map(str::to_string),
            role: "Referee".to_string(),
            competition: "Ligue 2".to_string(),
            home_team: "CRB".to_string(),
            away_team: "USMA".to_string(),
            venue: "Stade 20 Aout".to_string(),
            city: "Alger".to_string(),
            match_date: date!(2026 - 03 - 07),
            kickoff_time: time!(15:30),
        }
    }

    #[test]
    fn builds_message_with_note_and_attachment_name() {
        let mail = MissionOrderMail::for_mission(
            &source(Some(" karim@example.org ")),
            12,
            Some("Bring your licence."),
            Bytes::from_static(b"%PDF"),
        )
        .expect("mail");

        assert_eq!(mail.to, "karim@example.org");
        assert_eq!(mail.subject, "Mission order: CRB - USMA");
        assert_eq!(mail.attachment_name, "mission-order-00000012.pdf");
        assert!(mail.body.contains("Bring your licence."));
    }

    #[test]
    fn missing_address_is_an_error() {
        let err = MissionOrderMail::for_mission(&source(Some("  ")), 1, None, Bytes::new())
            .expect_err("no recipient");
        assert!(matches!(err, MailError::NoRecipient(_)));
    }
}
