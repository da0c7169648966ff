//! Mission order page template.
//!
//! Positions are authored from the top-left corner, as on paper, and converted to
//! the PDF's bottom-left origin as each element is placed.

use crate::domain::types::Direction;

use super::fields::{LabeledField, MissionFields};
use super::fonts::{FontSet, TextMeasure};
use super::qr::{QrMatrix, Rect};
use super::runs::{Align, DirectionalRun, Script, layout_runs, line_width, segment_runs};
use super::wrap::wrap_text;

/// A4 in points.
pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

const MARGIN: f32 = 56.0;

const LOGO_WIDTH: f32 = 84.0;
const LOGO_TOP: f32 = 36.0;
const WATERMARK_WIDTH: f32 = 360.0;
const WATERMARK_TOP: f32 = 250.0;
const AUTHORITY_TOP: f32 = 150.0;
const AUTHORITY_SIZE: f32 = 14.0;
/// Line advance of wrapped headings, as a multiple of their size.
const HEADING_LEADING: f32 = 1.25;
const TITLE_TOP: f32 = 188.0;
const TITLE_SIZE: f32 = 22.0;
const ORDER_TOP: f32 = 228.0;
const ORDER_SIZE: f32 = 12.0;
const ROWS_TOP: f32 = 280.0;
const ROW_STEP: f32 = 30.0;
const ROW_SIZE: f32 = 13.0;
const ROW_LEADING: f32 = 18.0;
const INSTRUCTIONS_GAP: f32 = 24.0;
const INSTRUCTIONS_SIZE: f32 = 11.0;
const INSTRUCTIONS_LEADING: f32 = 17.0;
const STAMP_WIDTH: f32 = 130.0;
const STAMP_TOP: f32 = 640.0;
const QR_SIZE: f32 = 96.0;
const QR_TOP: f32 = 660.0;
const CAPTION_SIZE: f32 = 8.0;
const CAPTION_LEADING: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Logo,
    Watermark,
    Stamp,
}

/// One run painted at a baseline, in PDF coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TextDraw {
    pub script: Script,
    /// Glyphs in painting order.
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDraw {
    pub slot: ImageSlot,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub translucent: bool,
}

/// Height over width of each image, so the template can keep proportions.
#[derive(Debug, Clone, Copy)]
pub struct ImageAspects {
    pub logo: f32,
    pub watermark: f32,
    pub stamp: f32,
}

/// Everything painted on the page, in painting order per kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub images: Vec<ImageDraw>,
    pub texts: Vec<TextDraw>,
    pub qr: Vec<Rect>,
}

struct Composer<'a, M> {
    fonts: &'a FontSet<M>,
    direction: Direction,
    layout: PageLayout,
}

impl<M: TextMeasure> Composer<'_, M> {
    fn line(
        &mut self,
        runs: &[DirectionalRun],
        size: f32,
        align: Align,
        top: f32,
        span: (f32, f32),
    ) {
        let (left, right) = span;
        let baseline = PAGE_HEIGHT - top;
        for placed in layout_runs(runs, self.fonts, size, self.direction, align, left, right) {
            let run = &runs[placed.index];
            if run.text.trim().is_empty() {
                continue;
            }
            self.layout.texts.push(TextDraw {
                script: run.script,
                text: run.visual_text(),
                x: placed.x,
                y: baseline,
                size,
            });
        }
    }

    /// Wrap `text` inside `span`, advancing by `leading` per line. Returns the top
    /// of the last line drawn.
    fn wrapped(
        &mut self,
        text: &str,
        size: f32,
        leading: f32,
        align: Align,
        top: f32,
        span: (f32, f32),
    ) -> f32 {
        let lines = wrap_text(text, self.direction, self.fonts, size, span.1 - span.0);
        let mut line_top = top;
        for (index, line) in lines.iter().enumerate() {
            line_top = top + leading * index as f32;
            let runs = segment_runs(line, self.direction);
            self.line(&runs, size, align, line_top, span);
        }
        line_top
    }

    /// A labeled row. The value wraps under itself with the label as a hanging
    /// indent on the start side.
    fn row(
        &mut self,
        fields: &MissionFields,
        row: &LabeledField,
        top: f32,
        span: (f32, f32),
    ) -> f32 {
        let label = fields.row_label(row);
        let indent = line_width(std::slice::from_ref(&label), self.fonts, ROW_SIZE);
        let hanging = match self.direction {
            Direction::Rtl => (span.0, span.1 - indent),
            Direction::Ltr => (span.0 + indent, span.1),
        };

        let width = hanging.1 - hanging.0;
        let lines = wrap_text(&row.value, self.direction, self.fonts, ROW_SIZE, width);
        let mut lines = lines.iter();
        let mut first = vec![label];
        if let Some(line) = lines.next() {
            first.extend(segment_runs(line, self.direction));
        }
        self.line(&first, ROW_SIZE, Align::Start, top, span);

        let mut line_top = top;
        for line in lines {
            line_top += ROW_LEADING;
            let runs = segment_runs(line, self.direction);
            self.line(&runs, ROW_SIZE, Align::Start, line_top, hanging);
        }
        line_top
    }

    fn image(&mut self, slot: ImageSlot, left: f32, top: f32, width: f32, aspect: f32, translucent: bool) {
        let height = width * aspect;
        self.layout.images.push(ImageDraw {
            slot,
            x: left,
            y: PAGE_HEIGHT - top - height,
            width,
            height,
            translucent,
        });
    }
}

/// Lay out a mission order. Pure: identical arguments give an identical layout.
pub fn compose_page<M: TextMeasure>(
    fields: &MissionFields,
    fonts: &FontSet<M>,
    aspects: ImageAspects,
    qr: &QrMatrix,
) -> PageLayout {
    let direction = fields.direction;
    let mut composer = Composer {
        fonts,
        direction,
        layout: PageLayout {
            images: Vec::new(),
            texts: Vec::new(),
            qr: Vec::new(),
        },
    };

    // start side is the right edge for RTL documents
    let start_left = |width: f32| match direction {
        Direction::Rtl => PAGE_WIDTH - MARGIN - width,
        Direction::Ltr => MARGIN,
    };
    let end_left = |width: f32| match direction {
        Direction::Rtl => MARGIN,
        Direction::Ltr => PAGE_WIDTH - MARGIN - width,
    };

    composer.image(
        ImageSlot::Watermark,
        (PAGE_WIDTH - WATERMARK_WIDTH) / 2.0,
        WATERMARK_TOP,
        WATERMARK_WIDTH,
        aspects.watermark,
        true,
    );
    composer.image(
        ImageSlot::Logo,
        (PAGE_WIDTH - LOGO_WIDTH) / 2.0,
        LOGO_TOP,
        LOGO_WIDTH,
        aspects.logo,
        false,
    );

    let content = (MARGIN, PAGE_WIDTH - MARGIN);

    // headings that wrap push everything below them down
    let authority_end = composer.wrapped(
        &fields.authority,
        AUTHORITY_SIZE,
        AUTHORITY_SIZE * HEADING_LEADING,
        Align::Center,
        AUTHORITY_TOP,
        content,
    );
    let mut shift = authority_end - AUTHORITY_TOP;
    let title_top = TITLE_TOP + shift;
    let title_end = composer.wrapped(
        &fields.title,
        TITLE_SIZE,
        TITLE_SIZE * HEADING_LEADING,
        Align::Center,
        title_top,
        content,
    );
    shift += title_end - title_top;

    let order = fields.order_runs();
    composer.line(&order, ORDER_SIZE, Align::Start, ORDER_TOP + shift, content);

    let mut top = ROWS_TOP + shift;
    for row in &fields.rows {
        top = composer.row(fields, row, top, content) + ROW_STEP;
    }

    top += INSTRUCTIONS_GAP;
    composer.wrapped(
        &fields.instructions,
        INSTRUCTIONS_SIZE,
        INSTRUCTIONS_LEADING,
        Align::Start,
        top,
        content,
    );

    composer.image(
        ImageSlot::Stamp,
        start_left(STAMP_WIDTH),
        STAMP_TOP,
        STAMP_WIDTH,
        aspects.stamp,
        false,
    );

    let qr_left = end_left(QR_SIZE);
    let qr_bottom = PAGE_HEIGHT - QR_TOP - QR_SIZE;
    composer.layout.qr = qr.rects(qr_left, qr_bottom, QR_SIZE);
    composer.wrapped(
        &fields.verify_caption,
        CAPTION_SIZE,
        CAPTION_LEADING,
        Align::Center,
        QR_TOP + QR_SIZE + CAPTION_SIZE + 4.0,
        (qr_left, qr_left + QR_SIZE),
    );

    composer.layout
}
