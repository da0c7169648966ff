//! Directional runs and their horizontal placement.
//!
//! A field is an ordered list of runs, each in one script and drawn with that
//! script's font. Layout only handles the fixed shapes the mission order uses
//! (single-line fields, composite order numbers and wrapped paragraphs); there is
//! no general bidirectional algorithm here.

use crate::domain::types::Direction;

use super::fonts::{FontSet, TextMeasure};
use super::shaping::{is_arabic, shape_arabic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Arabic,
    Latin,
}

impl Script {
    pub fn of_direction(direction: Direction) -> Self {
        match direction {
            Direction::Rtl => Script::Arabic,
            Direction::Ltr => Script::Latin,
        }
    }

    fn classify(ch: char) -> Option<Self> {
        if is_arabic(ch) {
            Some(Script::Arabic)
        } else if ch.is_alphanumeric() {
            Some(Script::Latin)
        } else {
            None
        }
    }
}

/// A span of text in a single script. Arabic text is stored already shaped.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalRun {
    pub script: Script,
    pub text: String,
}

impl DirectionalRun {
    pub fn new(script: Script, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = match script {
            Script::Arabic => shape_arabic(&text),
            Script::Latin => text,
        };
        Self { script, text }
    }

    /// Glyphs left to right as they are painted.
    pub fn visual_text(&self) -> String {
        match self.script {
            Script::Arabic => self.text.chars().rev().collect(),
            Script::Latin => self.text.clone(),
        }
    }
}

/// Split `text` into runs by script, in logical order.
///
/// Neutral characters (spaces, punctuation) stay with the run they follow; leading
/// neutrals go with the first strong run, or the field direction when there is none.
pub fn segment_runs(text: &str, direction: Direction) -> Vec<DirectionalRun> {
    let mut runs: Vec<(Script, String)> = Vec::new();
    let mut pending = String::new();

    for ch in text.chars() {
        match Script::classify(ch) {
            None => match runs.last_mut() {
                Some((_, current)) => current.push(ch),
                None => pending.push(ch),
            },
            Some(script) => match runs.last_mut() {
                Some((current_script, current)) if *current_script == script => current.push(ch),
                _ => {
                    let mut run = std::mem::take(&mut pending);
                    run.push(ch);
                    runs.push((script, run));
                }
            },
        }
    }

    if runs.is_empty() && !pending.is_empty() {
        runs.push((Script::of_direction(direction), pending));
    }

    runs.into_iter()
        .map(|(script, text)| DirectionalRun::new(script, text))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Towards the start edge of the direction (right for RTL).
    Start,
    Center,
    /// Towards the end edge of the direction (left for RTL).
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRun {
    /// Index into the run list.
    pub index: usize,
    /// Left edge in points.
    pub x: f32,
    pub width: f32,
}

pub fn run_width<M: TextMeasure>(run: &DirectionalRun, fonts: &FontSet<M>, size: f32) -> f32 {
    fonts.for_script(run.script).width(&run.text, size)
}

pub fn line_width<M: TextMeasure>(runs: &[DirectionalRun], fonts: &FontSet<M>, size: f32) -> f32 {
    runs.iter().map(|run| run_width(run, fonts, size)).sum()
}

/// Place runs on one line between `left` and `right`.
///
/// Each run is measured with its own font. For RTL lines the first logical run sits
/// rightmost and later runs continue leftwards; for LTR lines the reverse.
pub fn layout_runs<M: TextMeasure>(
    runs: &[DirectionalRun],
    fonts: &FontSet<M>,
    size: f32,
    direction: Direction,
    align: Align,
    left: f32,
    right: f32,
) -> Vec<PlacedRun> {
    let widths: Vec<f32> = runs
        .iter()
        .map(|run| run_width(run, fonts, size))
        .collect();
    let total: f32 = widths.iter().sum();

    let line_left = match (align, direction) {
        (Align::Center, _) => left + (right - left - total) / 2.0,
        (Align::Start, Direction::Rtl) | (Align::End, Direction::Ltr) => right - total,
        (Align::Start, Direction::Ltr) | (Align::End, Direction::Rtl) => left,
    };

    let mut placed = Vec::with_capacity(runs.len());
    let mut consumed = 0.0;
    for (index, width) in widths.into_iter().enumerate() {
        let x = match direction {
            Direction::Ltr => line_left + consumed,
            Direction::Rtl => line_left + total - consumed - width,
        };
        placed.push(PlacedRun { index, x, width });
        consumed += width;
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::fonts::tests::{Mono, mono_fonts};

    #[test]
    fn segments_split_on_script_changes() {
        let runs = segment_runs("\u{0631}\u{0642}\u{0645} 0042/LR", Direction::Rtl);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].script, Script::Arabic);
        assert!(runs[0].text.ends_with(' '));
        assert_eq!(runs[1].script, Script::Latin);
        assert_eq!(runs[1].text, "0042/LR");
    }

    #[test]
    fn leading_neutrals_join_the_first_strong_run() {
        let runs = segment_runs("  (Alger)", Direction::Rtl);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].script, Script::Latin);
        assert_eq!(runs[0].text, "  (Alger)");
    }

    #[test]
    fn neutral_only_text_takes_the_field_direction() {
        let runs = segment_runs(" - ", Direction::Rtl);
        assert_eq!(runs, vec![DirectionalRun::new(Script::Arabic, " - ")]);
    }

    #[test]
    fn arabic_runs_are_shaped_and_painted_reversed() {
        let run = DirectionalRun::new(Script::Arabic, "\u{0628}\u{0628}");
        assert_eq!(run.text, "\u{FE91}\u{FE90}");
        assert_eq!(run.visual_text(), "\u{FE90}\u{FE91}");
    }

    #[test]
    fn rtl_layout_places_first_run_rightmost() {
        let fonts = mono_fonts(10.0, 5.0);
        let runs = vec![
            DirectionalRun::new(Script::Arabic, "\u{0628}\u{0628}"),
            DirectionalRun::new(Script::Latin, "0042"),
        ];

        let placed = layout_runs(&runs, &fonts, 1.0, Direction::Rtl, Align::Start, 0.0, 100.0);
        // arabic run: 2 glyphs * 10, latin run: 4 glyphs * 5
        assert_eq!(placed[0], PlacedRun { index: 0, x: 80.0, width: 20.0 });
        assert_eq!(placed[1], PlacedRun { index: 1, x: 60.0, width: 20.0 });
    }

    #[test]
    fn ltr_layout_runs_left_to_right() {
        let fonts = mono_fonts(10.0, 5.0);
        let runs = vec![
            DirectionalRun::new(Script::Latin, "Ordre "),
            DirectionalRun::new(Script::Arabic, "\u{0628}"),
        ];

        let placed = layout_runs(&runs, &fonts, 1.0, Direction::Ltr, Align::Start, 10.0, 200.0);
        assert_eq!(placed[0].x, 10.0);
        assert_eq!(placed[1].x, 40.0);
    }

    #[test]
    fn centered_layout_balances_both_sides() {
        let fonts = FontSet::new(Mono(4.0), Mono(4.0));
        let runs = vec![DirectionalRun::new(Script::Latin, "abcde")];
        let placed = layout_runs(&runs, &fonts, 1.0, Direction::Rtl, Align::Center, 0.0, 100.0);
        assert_eq!(placed[0].x, 40.0);
        assert_eq!(line_width(&runs, &fonts, 1.0), 20.0);
    }
}
