//! The fixed field set printed on a mission order.

use crate::domain::mission::{OrderNumber, RenderingInput};
use crate::domain::types::Direction;

use super::runs::{DirectionalRun, Script, segment_runs};

struct Labels {
    order: &'static str,
    official: &'static str,
    role: &'static str,
    competition: &'static str,
    fixture: &'static str,
    location: &'static str,
    date: &'static str,
    kickoff: &'static str,
    verify: &'static str,
}

const ARABIC_LABELS: Labels = Labels {
    order: "رقم الأمر",
    official: "الاسم واللقب",
    role: "الصفة",
    competition: "المنافسة",
    fixture: "المقابلة",
    location: "الملعب",
    date: "التاريخ",
    kickoff: "التوقيت",
    verify: "امسح الرمز للتحقق",
};

const FRENCH_LABELS: Labels = Labels {
    order: "Ordre de mission n°",
    official: "Nom et prénom",
    role: "Fonction",
    competition: "Compétition",
    fixture: "Rencontre",
    location: "Stade",
    date: "Date",
    kickoff: "Heure",
    verify: "Scanner pour vérifier",
};

fn labels(direction: Direction) -> &'static Labels {
    match direction {
        Direction::Rtl => &ARABIC_LABELS,
        Direction::Ltr => &FRENCH_LABELS,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledField {
    pub label: String,
    pub value: String,
}

/// Text content of one page, before layout.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionFields {
    pub direction: Direction,
    pub authority: String,
    pub title: String,
    pub order_label: String,
    pub order_number: OrderNumber,
    pub rows: Vec<LabeledField>,
    pub instructions: String,
    pub verify_caption: String,
}

impl MissionFields {
    pub fn from_input(input: &RenderingInput, sequence_number: i64) -> Self {
        let labels = labels(input.direction);
        let mission = &input.mission;
        let row = |label: &str, value: String| LabeledField {
            label: label.to_string(),
            value,
        };

        Self {
            direction: input.direction,
            authority: input.authority.clone(),
            title: input.title.clone(),
            order_label: labels.order.to_string(),
            order_number: input.order_number(sequence_number),
            rows: vec![
                row(labels.official, mission.official_name.clone()),
                row(labels.role, mission.role.clone()),
                row(labels.competition, mission.competition.clone()),
                row(labels.fixture, mission.fixture()),
                row(labels.location, mission.location()),
                row(labels.date, mission.match_date.clone()),
                row(labels.kickoff, mission.kickoff_time.clone()),
            ],
            instructions: input.instructions.clone(),
            verify_caption: labels.verify.to_string(),
        }
    }

    /// `label: number/suffix/year` as explicit runs.
    ///
    /// The number and year are always Latin digits; the suffix takes whatever script
    /// it is written in. Separators ride on the segment they follow.
    pub fn order_runs(&self) -> Vec<DirectionalRun> {
        let label_script = Script::of_direction(self.direction);
        let mut runs = vec![DirectionalRun::new(
            label_script,
            format!("{}: ", self.order_label),
        )];

        if self.order_number.suffix.is_empty() {
            runs.push(DirectionalRun::new(
                Script::Latin,
                format!("{}/{}", self.order_number.number, self.order_number.year),
            ));
            return runs;
        }

        runs.push(DirectionalRun::new(
            Script::Latin,
            format!("{}/", self.order_number.number),
        ));
        let suffix_runs = segment_runs(&format!("{}/", self.order_number.suffix), self.direction);
        runs.extend(suffix_runs);
        runs.push(DirectionalRun::new(
            Script::Latin,
            self.order_number.year.clone(),
        ));
        runs
    }

    /// `label: value` for one row, label in the direction's script.
    /// The `label: ` lead-in of a row, in the document's script.
    pub fn row_label(&self, row: &LabeledField) -> DirectionalRun {
        DirectionalRun::new(
            Script::of_direction(self.direction),
            format!("{}: ", row.label),
        )
    }
}
