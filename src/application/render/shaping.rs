//! Arabic letter joining.
//!
//! Maps base letters to their contextual presentation forms so glyph widths and
//! drawn glyphs match what a reader expects. Tashkeel marks are dropped.

const TATWEEL: char = '\u{0640}';
const LAM: char = '\u{0644}';

/// Presentation forms of one letter: isolated, final, initial, medial.
/// Right-joining letters have no initial or medial form.
#[derive(Clone, Copy)]
struct Forms {
    isolated: u32,
    final_form: u32,
    initial: Option<u32>,
    medial: Option<u32>,
}

const fn right(isolated: u32) -> Forms {
    Forms {
        isolated,
        final_form: isolated + 1,
        initial: None,
        medial: None,
    }
}

const fn dual(isolated: u32) -> Forms {
    Forms {
        isolated,
        final_form: isolated + 1,
        initial: Some(isolated + 2),
        medial: Some(isolated + 3),
    }
}

const fn lone(isolated: u32) -> Forms {
    Forms {
        isolated,
        final_form: isolated,
        initial: None,
        medial: None,
    }
}

fn forms(ch: char) -> Option<Forms> {
    let forms = match ch {
        '\u{0621}' => lone(0xFE80),
        '\u{0622}' => right(0xFE81),
        '\u{0623}' => right(0xFE83),
        '\u{0624}' => right(0xFE85),
        '\u{0625}' => right(0xFE87),
        '\u{0626}' => dual(0xFE89),
        '\u{0627}' => right(0xFE8D),
        '\u{0628}' => dual(0xFE8F),
        '\u{0629}' => right(0xFE93),
        '\u{062A}' => dual(0xFE95),
        '\u{062B}' => dual(0xFE99),
        '\u{062C}' => dual(0xFE9D),
        '\u{062D}' => dual(0xFEA1),
        '\u{062E}' => dual(0xFEA5),
        '\u{062F}' => right(0xFEA9),
        '\u{0630}' => right(0xFEAB),
        '\u{0631}' => right(0xFEAD),
        '\u{0632}' => right(0xFEAF),
        '\u{0633}' => dual(0xFEB1),
        '\u{0634}' => dual(0xFEB5),
        '\u{0635}' => dual(0xFEB9),
        '\u{0636}' => dual(0xFEBD),
        '\u{0637}' => dual(0xFEC1),
        '\u{0638}' => dual(0xFEC5),
        '\u{0639}' => dual(0xFEC9),
        '\u{063A}' => dual(0xFECD),
        '\u{0641}' => dual(0xFED1),
        '\u{0642}' => dual(0xFED5),
        '\u{0643}' => dual(0xFED9),
        '\u{0644}' => dual(0xFEDD),
        '\u{0645}' => dual(0xFEE1),
        '\u{0646}' => dual(0xFEE5),
        '\u{0647}' => dual(0xFEE9),
        '\u{0648}' => right(0xFEED),
        '\u{0649}' => right(0xFEEF),
        '\u{064A}' => dual(0xFEF1),
        _ => return None,
    };
    Some(forms)
}

/// Isolated and final forms of the lam-alef ligature for the given alef.
fn lam_alef(alef: char) -> Option<(u32, u32)> {
    match alef {
        '\u{0622}' => Some((0xFEF5, 0xFEF6)),
        '\u{0623}' => Some((0xFEF7, 0xFEF8)),
        '\u{0625}' => Some((0xFEF9, 0xFEFA)),
        '\u{0627}' => Some((0xFEFB, 0xFEFC)),
        _ => None,
    }
}

/// Harakat, superscript alef and Quranic marks.
pub fn is_tashkeel(ch: char) -> bool {
    matches!(ch, '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}')
}

/// Characters of the Arabic script, base letters and presentation forms alike.
pub fn is_arabic(ch: char) -> bool {
    matches!(
        ch,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

fn joins_forward(ch: char) -> bool {
    ch == TATWEEL || forms(ch).is_some_and(|forms| forms.initial.is_some())
}

fn joins_backward(ch: char) -> bool {
    ch == TATWEEL || forms(ch).is_some_and(|forms| forms.final_form != forms.isolated)
}

/// Replace Arabic base letters with contextual presentation forms, in logical order.
///
/// Text without Arabic letters is returned unchanged apart from dropped tashkeel.
pub fn shape_arabic(text: &str) -> String {
    let letters: Vec<char> = text.chars().filter(|ch| !is_tashkeel(*ch)).collect();
    let mut shaped = String::with_capacity(text.len());

    let mut index = 0;
    while index < letters.len() {
        let ch = letters[index];
        let prev_joins = index
            .checked_sub(1)
            .map(|prev| letters[prev])
            .is_some_and(joins_forward);

        if ch == LAM
            && let Some(next) = letters.get(index + 1)
            && let Some((isolated, final_form)) = lam_alef(*next)
        {
            push_code(&mut shaped, if prev_joins { final_form } else { isolated });
            index += 2;
            continue;
        }

        let Some(letter_forms) = forms(ch) else {
            shaped.push(ch);
            index += 1;
            continue;
        };

        let joins_prev = prev_joins && joins_backward(ch);
        let joins_next = letter_forms.initial.is_some()
            && letters.get(index + 1).copied().is_some_and(joins_backward);

        let code = match (joins_prev, joins_next) {
            (true, true) => letter_forms.medial.unwrap_or(letter_forms.final_form),
            (true, false) => letter_forms.final_form,
            (false, true) => letter_forms.initial.unwrap_or(letter_forms.isolated),
            (false, false) => letter_forms.isolated,
        };
        push_code(&mut shaped, code);
        index += 1;
    }

    shaped
}

fn push_code(out: &mut String, code: u32) {
    if let Some(ch) = char::from_u32(code) {
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(text: &str) -> Vec<u32> {
        text.chars().map(u32::from).collect()
    }

    #[test]
    fn latin_text_is_untouched() {
        assert_eq!(shape_arabic("Stade 20 Aout"), "Stade 20 Aout");
    }

    #[test]
    fn dual_joining_letters_take_positional_forms() {
        // beh beh beh: initial, medial, final
        let shaped = shape_arabic("\u{0628}\u{0628}\u{0628}");
        assert_eq!(codes(&shaped), vec![0xFE91, 0xFE92, 0xFE90]);
    }

    #[test]
    fn right_joining_letters_break_the_chain() {
        // beh dal beh: initial, final, isolated
        let shaped = shape_arabic("\u{0628}\u{062F}\u{0628}");
        assert_eq!(codes(&shaped), vec![0xFE91, 0xFEAA, 0xFE8F]);
    }

    #[test]
    fn lam_alef_forms_a_ligature() {
        // alef lam alef: isolated alef, isolated lam-alef
        let shaped = shape_arabic("\u{0627}\u{0644}\u{0627}");
        assert_eq!(codes(&shaped), vec![0xFE8D, 0xFEFB]);

        // beh lam alef: initial beh, final lam-alef
        let shaped = shape_arabic("\u{0628}\u{0644}\u{0627}");
        assert_eq!(codes(&shaped), vec![0xFE91, 0xFEFC]);
    }

    #[test]
    fn tashkeel_is_dropped_before_joining() {
        // beh fatha beh
        let shaped = shape_arabic("\u{0628}\u{064E}\u{0628}");
        assert_eq!(codes(&shaped), vec![0xFE91, 0xFE90]);
    }

    #[test]
    fn words_are_shaped_independently() {
        let shaped = shape_arabic("\u{0628}\u{0628} \u{0628}");
        assert_eq!(codes(&shaped), vec![0xFE91, 0xFE90, 0x20, 0xFE8F]);
    }

    #[test]
    fn script_detection_covers_presentation_forms() {
        assert!(is_arabic('\u{0627}'));
        assert!(is_arabic('\u{FEFB}'));
        assert!(!is_arabic('A'));
        assert!(!is_arabic('7'));
    }
}
