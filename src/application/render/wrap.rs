use crate::domain::types::Direction;

use super::fonts::{FontSet, TextMeasure};
use super::runs::{line_width, segment_runs};

/// Greedy word wrap. Widths are measured on shaped runs with each run's own font.
///
/// A word wider than `max_width` is broken at character boundaries so no line
/// exceeds the width, except a single character that is wider on its own.
pub fn wrap_text<M: TextMeasure>(
    text: &str,
    direction: Direction,
    fonts: &FontSet<M>,
    size: f32,
    max_width: f32,
) -> Vec<String> {
    let measure = |candidate: &str| line_width(&segment_runs(candidate, direction), fonts, size);

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        for piece in break_word(word, max_width, &measure) {
            if current.is_empty() {
                current = piece;
                continue;
            }

            let candidate = format!("{current} {piece}");
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn break_word(word: &str, max_width: f32, measure: &impl Fn(&str) -> f32) -> Vec<String> {
    if measure(word) <= max_width {
        return vec![word.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().nth(1).is_some() && measure(&piece) > max_width {
            piece.pop();
            pieces.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}
