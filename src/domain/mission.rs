//! Mission order source data, the canonical rendering input and its public projection.

use missive_api_types::VerificationView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Date, Time, macros::format_description};

use super::{entities::DocumentRecord, error::DomainError, subjects::SubjectKey, types::Direction};

/// Bumped whenever the page layout changes so cached documents re-render.
pub const TEMPLATE_REVISION: u32 = 1;

/// Current scheduling data for one subject, as supplied by the dashboard's tables.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionSource {
    pub subject: SubjectKey,
    pub official_name: String,
    pub official_email: Option<String>,
    pub role: String,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    pub venue: String,
    pub city: String,
    pub match_date: Date,
    pub kickoff_time: Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionSnapshot {
    pub subject: SubjectKey,
    pub official_name: String,
    pub role: String,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    pub venue: String,
    pub city: String,
    /// `YYYY-MM-DD`
    pub match_date: String,
    /// `HH:MM`
    pub kickoff_time: String,
}

impl MissionSnapshot {
    pub fn from_source(source: &MissionSource) -> Result<Self, DomainError> {
        let match_date = source
            .match_date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|err| DomainError::mission_data(format!("unformattable date: {err}")))?;
        let kickoff_time = source
            .kickoff_time
            .format(format_description!("[hour]:[minute]"))
            .map_err(|err| DomainError::mission_data(format!("unformattable time: {err}")))?;

        Ok(Self {
            subject: source.subject.clone(),
            official_name: source.official_name.trim().to_string(),
            role: source.role.trim().to_string(),
            competition: source.competition.trim().to_string(),
            home_team: source.home_team.trim().to_string(),
            away_team: source.away_team.trim().to_string(),
            venue: source.venue.trim().to_string(),
            city: source.city.trim().to_string(),
            match_date,
            kickoff_time,
        })
    }

    pub fn fixture(&self) -> String {
        format!("{} - {}", self.home_team, self.away_team)
    }

    pub fn location(&self) -> String {
        format!("{}, {}", self.venue, self.city)
    }

    /// Year part of `match_date`, used in the order number.
    pub fn season_year(&self) -> &str {
        self.match_date.split('-').next().unwrap_or_default()
    }
}

/// Everything that influences the rendered bytes apart from the document identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderingInput {
    pub template: u32,
    pub direction: Direction,
    pub authority: String,
    pub title: String,
    pub order_suffix: String,
    pub instructions: String,
    pub mission: MissionSnapshot,
}

impl RenderingInput {
    /// Canonical JSON form; object keys come out sorted.
    pub fn canonical_json(&self) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(self)
            .map_err(|err| DomainError::mission_data(format!("rendering input: {err}")))
    }

    /// Hex SHA-256 of the canonical JSON.
    pub fn data_hash(&self) -> Result<String, DomainError> {
        let canonical = self.canonical_json()?;
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Ok(hex::encode(digest.as_slice()))
    }

    pub fn order_number(&self, sequence_number: i64) -> OrderNumber {
        OrderNumber {
            number: format!("{sequence_number:04}"),
            suffix: self.order_suffix.clone(),
            year: self.mission.season_year().to_string(),
        }
    }
}

/// `<number>/<suffix>/<year>`, e.g. `0042/ر.ج/2026`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumber {
    pub number: String,
    pub suffix: String,
    pub year: String,
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.suffix.is_empty() {
            write!(f, "{}/{}", self.number, self.year)
        } else {
            write!(f, "{}/{}/{}", self.number, self.suffix, self.year)
        }
    }
}

/// Curated public projection of a stored document.
pub fn verification_view(record: &DocumentRecord) -> Result<VerificationView, DomainError> {
    let input: RenderingInput = serde_json::from_value(record.data_snapshot.clone())
        .map_err(|err| DomainError::mission_data(format!("stored snapshot is malformed: {err}")))?;
    let order_number = input.order_number(record.sequence_number).to_string();
    let mission = input.mission;

    Ok(VerificationView {
        official_name: mission.official_name.clone(),
        role: mission.role.clone(),
        fixture: mission.fixture(),
        competition: mission.competition.clone(),
        location: mission.location(),
        match_date: mission.match_date.clone(),
        order_number,
        issued_at: record.created_at,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::{date, time};

    use super::*;

    fn source() -> MissionSource {
        MissionSource {
            subject: SubjectKey::parse("m1:o1").expect("valid key"),
            official_name: " Karim Benali ".to_string(),
            official_email: Some("karim@example.org".to_string()),
            role: "Referee".to_string(),
            competition: "Ligue Regionale".to_string(),
            home_team: "CR Belouizdad".to_string(),
            away_team: "USM Alger".to_string(),
            venue: "Stade 20 Aout".to_string(),
            city: "Alger".to_string(),
            match_date: date!(2026 - 03 - 07),
            kickoff_time: time!(15:30),
        }
    }

    fn input() -> RenderingInput {
        RenderingInput {
            template: TEMPLATE_REVISION,
            direction: Direction::Rtl,
            authority: "Ligue".to_string(),
            title: "Ordre de mission".to_string(),
            order_suffix: "LR".to_string(),
            instructions: String::new(),
            mission: MissionSnapshot::from_source(&source()).expect("snapshot"),
        }
    }

    #[test]
    fn snapshot_formats_date_and_time() {
        let snapshot = MissionSnapshot::from_source(&source()).expect("snapshot");
        assert_eq!(snapshot.official_name, "Karim Benali");
        assert_eq!(snapshot.match_date, "2026-03-07");
        assert_eq!(snapshot.kickoff_time, "15:30");
        assert_eq!(snapshot.season_year(), "2026");
    }

    #[test]
    fn data_hash_is_stable_and_content_sensitive() {
        let first = input().data_hash().expect("hash");
        assert_eq!(first, input().data_hash().expect("hash"));
        assert_eq!(first.len(), 64);

        let mut changed = input();
        changed.mission.venue = "Stade 5 Juillet".to_string();
        assert_ne!(first, changed.data_hash().expect("hash"));
    }

    #[test]
    fn canonical_json_has_sorted_keys() {
        let text = input().canonical_json().expect("json").to_string();
        let authority = text.find("\"authority\"").expect("authority key");
        let template = text.find("\"template\"").expect("template key");
        assert!(authority < template);
    }

    #[test]
    fn order_number_pads_sequence() {
        let number = input().order_number(42);
        assert_eq!(number.to_string(), "0042/LR/2026");
    }

    #[test]
    fn verification_view_exposes_curated_fields() {
        let record = DocumentRecord {
            id: uuid::Uuid::new_v4(),
            sequence_number: 7,
            subject_key: SubjectKey::parse("m1:o1").expect("valid key"),
            data_hash: "abc".to_string(),
            data_snapshot: input().canonical_json().expect("json"),
            storage_path: Some("documents/00000007.pdf".to_string()),
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };

        let view = verification_view(&record).expect("view");
        assert_eq!(view.official_name, "Karim Benali");
        assert_eq!(view.fixture, "CR Belouizdad - USM Alger");
        assert_eq!(view.location, "Stade 20 Aout, Alger");
        assert_eq!(view.order_number, "0007/LR/2026");
        let json = serde_json::to_string(&view).expect("serializes");
        assert!(!json.contains("documents/"));
    }
}
