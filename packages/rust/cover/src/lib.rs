//! Cover page composition for order packets.
//!
//! Lays out order metadata, material status, components, and sub-tasks
//! onto one or more A4 pages, optionally embedding the scan code, and
//! returns the result as PDF bytes ready for the merge engine.
//!
//! The layout is single-pass, top to bottom, with a fixed left margin. A
//! single [`Cursor`] owns the vertical position; every emitted line runs an
//! overflow check first, so long descriptions and notes flow onto
//! continuation pages instead of silently truncating below the bottom
//! margin. The optional footer band sits below the writable area and can
//! therefore never collide with flowed content.

mod labels;

use std::io::BufWriter;

use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Px,
    Rgb,
};
use tracing::{debug, instrument};

use orderpack_code::CodeImage;
use orderpack_shared::{CompositionOptions, Order, OrderpackError, Result};

// Page geometry (A4, millimetres).
const PAGE_WIDTH: f64 = 210.0;
const PAGE_HEIGHT: f64 = 297.0;
const MARGIN_LEFT: f64 = 20.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
/// Writable floor; the footer band lives below it.
const MARGIN_BOTTOM: f64 = 28.0;
const WRITABLE_WIDTH: f64 = PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;

// Field table and list geometry.
const FIELD_COLUMN_MM: f64 = 48.0;
const FIELD_VALUE_WIDTH_MM: f64 = WRITABLE_WIDTH - FIELD_COLUMN_MM;
const INDENT_MM: f64 = 6.0;

// Type sizes (points).
const TITLE_SIZE: f64 = 20.0;
const SUBTITLE_SIZE: f64 = 12.0;
const HEADING_SIZE: f64 = 12.5;
const BODY_SIZE: f64 = 10.5;
const SMALL_SIZE: f64 = 9.0;

// Scan code placement.
const CODE_SIZE_MM: f64 = 30.0;
const CODE_TOP_OFFSET_MM: f64 = 18.0;
const FOOTER_CODE_MM: f64 = 18.0;
const FOOTER_TEXT_Y: f64 = 14.0;
const FOOTER_CODE_Y: f64 = 6.0;

const PT_TO_MM: f64 = 0.352_778;
const LINE_SPACING: f64 = 1.45;
/// Average Helvetica glyph advance as a fraction of the point size; used
/// for width-estimated word wrap.
const AVG_CHAR_WIDTH_EM: f64 = 0.5;

// ---------------------------------------------------------------------------
// CoverPages
// ---------------------------------------------------------------------------

/// Composed cover pages as serialized PDF bytes.
#[derive(Debug, Clone)]
pub struct CoverPages {
    /// Serialized PDF containing only the cover pages.
    pub bytes: Vec<u8>,
    /// Number of pages emitted.
    pub page_count: usize,
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Compose the cover page(s) for an order.
///
/// Section order is fixed: scan code (top-right), title block, field
/// table, description, notes (when present), material status, components
/// (when present and enabled), sub-tasks (when present), scan code footer.
/// The code image is only rendered when `options.include_code` is set and
/// an image was actually produced.
#[instrument(skip_all, fields(order_id = %order.id))]
pub fn compose(
    order: &Order,
    options: &CompositionOptions,
    code: Option<&CodeImage>,
) -> Result<CoverPages> {
    let number = order.display_number().to_string();

    let (doc, page1, layer1) = PdfDocument::new(
        format!("Work order {number}"),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Cover",
    );

    let body = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| OrderpackError::cover(format!("font registration failed: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| OrderpackError::cover(format!("font registration failed: {e}")))?;

    let first_layer = doc.get_page(page1).get_layer(layer1);
    let code = if options.include_code { code } else { None };

    if let Some(image) = code {
        embed_code(
            &first_layer,
            image,
            PAGE_WIDTH - MARGIN_RIGHT - CODE_SIZE_MM,
            PAGE_HEIGHT - CODE_TOP_OFFSET_MM - CODE_SIZE_MM,
            CODE_SIZE_MM,
        );
    }

    let mut cursor = Cursor::new(&doc, first_layer.clone(), body.clone(), bold);

    // Title block.
    cursor.text_line(labels::TITLE, TITLE_SIZE, true, MARGIN_LEFT);
    cursor.gap(1.0);
    cursor.text_line(
        &format!("{} {number}", labels::ORDER_NUMBER_PREFIX),
        SUBTITLE_SIZE,
        false,
        MARGIN_LEFT,
    );
    cursor.gap(2.0);
    cursor.rule();
    cursor.gap(6.0);

    // Field table, fixed order.
    cursor.field_row(labels::FIELD_TITLE, &order.title);
    cursor.field_row(labels::FIELD_CLIENT, &order.client_name);
    cursor.field_row(labels::FIELD_COST_CENTER, &order.cost_center);
    cursor.field_row(
        labels::FIELD_DEADLINE,
        &order.deadline.format(labels::DATE_FORMAT).to_string(),
    );
    cursor.field_row(labels::FIELD_PRIORITY, order.priority.display_label());
    cursor.field_row(labels::FIELD_STATUS, order.status.display_label());
    cursor.field_row(
        labels::FIELD_ESTIMATED_HOURS,
        &labels::hours(order.estimated_hours),
    );
    cursor.field_row(labels::FIELD_ACTUAL_HOURS, &labels::hours(order.actual_hours));
    cursor.field_row(
        labels::FIELD_ASSIGNEE,
        order.assignee.as_deref().unwrap_or(labels::UNASSIGNED),
    );
    cursor.field_row(
        labels::FIELD_CREATED,
        &order.created_at.format(labels::DATE_FORMAT).to_string(),
    );

    // Description.
    cursor.section(labels::SECTION_DESCRIPTION);
    cursor.wrapped(&order.description, BODY_SIZE, MARGIN_LEFT, WRITABLE_WIDTH);

    // Notes, only when present.
    if !order.notes.trim().is_empty() {
        cursor.section(labels::SECTION_NOTES);
        cursor.wrapped(&order.notes, BODY_SIZE, MARGIN_LEFT, WRITABLE_WIDTH);
    }

    // Material status.
    cursor.section(labels::SECTION_MATERIAL);
    cursor.field_row(
        labels::MATERIAL_ORDERED_WORKSHOP,
        labels::yes_no(order.material.ordered_by_workshop),
    );
    cursor.field_row(
        labels::MATERIAL_ORDERED_CLIENT,
        labels::yes_no(order.material.ordered_by_client),
    );
    cursor.field_row(
        labels::MATERIAL_CONFIRMED,
        labels::yes_no(order.material.client_order_confirmed),
    );
    cursor.field_row(
        labels::MATERIAL_AVAILABLE,
        labels::yes_no(order.material.available),
    );

    // Components, only when present and enabled.
    if options.include_components && !order.components.is_empty() {
        cursor.section(labels::SECTION_COMPONENTS);
        for (i, component) in order.components.iter().enumerate() {
            cursor.text_line(
                &format!("{}. {}", i + 1, component.title),
                BODY_SIZE,
                true,
                MARGIN_LEFT,
            );
            if !component.description.trim().is_empty() {
                cursor.wrapped(
                    &component.description,
                    BODY_SIZE,
                    MARGIN_LEFT + INDENT_MM,
                    WRITABLE_WIDTH - INDENT_MM,
                );
            }
            cursor.gap(1.5);
        }
    }

    // Sub-tasks, only when present.
    if !order.subtasks.is_empty() {
        cursor.section(labels::SECTION_SUBTASKS);
        for (i, task) in order.subtasks.iter().enumerate() {
            cursor.text_line(
                &format!("{}. {}", i + 1, task.title),
                BODY_SIZE,
                true,
                MARGIN_LEFT,
            );
            if !task.description.trim().is_empty() {
                cursor.wrapped(
                    &task.description,
                    BODY_SIZE,
                    MARGIN_LEFT + INDENT_MM,
                    WRITABLE_WIDTH - INDENT_MM,
                );
            }
            if task.estimated_hours.is_some() {
                cursor.text_line(
                    &format!(
                        "{} {}",
                        labels::ESTIMATED_PREFIX,
                        labels::hours(task.estimated_hours)
                    ),
                    SMALL_SIZE,
                    false,
                    MARGIN_LEFT + INDENT_MM,
                );
            }
            cursor.gap(1.5);
        }
    }

    // Footer band on the first page, below the writable area.
    if let Some(image) = code {
        first_layer.use_text(
            format!(
                "{} {number} | {}",
                labels::ORDER_NUMBER_PREFIX, order.client_name
            ),
            SMALL_SIZE,
            Mm(MARGIN_LEFT),
            Mm(FOOTER_TEXT_Y),
            &body,
        );
        embed_code(
            &first_layer,
            image,
            PAGE_WIDTH - MARGIN_RIGHT - FOOTER_CODE_MM,
            FOOTER_CODE_Y,
            FOOTER_CODE_MM,
        );
    }

    let page_count = cursor.pages;
    drop(cursor);

    let mut bytes: Vec<u8> = Vec::new();
    doc.save(&mut BufWriter::new(&mut bytes))
        .map_err(|e| OrderpackError::cover(format!("cover serialization failed: {e}")))?;

    debug!(page_count, len = bytes.len(), "cover composed");

    Ok(CoverPages { bytes, page_count })
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Single-pass layout cursor.
///
/// `y` is the top of the next line, measured from the page bottom. Every
/// emission path calls [`Cursor::ensure`] before drawing, which starts a
/// fresh page once the content would cross the writable floor.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f64,
    pages: usize,
    body: IndirectFontRef,
    bold: IndirectFontRef,
}

impl<'a> Cursor<'a> {
    fn new(
        doc: &'a PdfDocumentReference,
        layer: PdfLayerReference,
        body: IndirectFontRef,
        bold: IndirectFontRef,
    ) -> Self {
        Self {
            doc,
            layer,
            y: PAGE_HEIGHT - MARGIN_TOP,
            pages: 1,
            body,
            bold,
        }
    }

    /// Start a new page if `needed_mm` of content would cross the floor.
    fn ensure(&mut self, needed_mm: f64) {
        if self.y - needed_mm < MARGIN_BOTTOM {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            format!("Cover {}", self.pages + 1),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN_TOP;
        self.pages += 1;
    }

    /// Emit one line of text at the given left edge.
    fn text_line(&mut self, text: &str, size_pt: f64, bold: bool, x_mm: f64) {
        self.ensure(line_height_mm(size_pt));
        let font = if bold {
            self.bold.clone()
        } else {
            self.body.clone()
        };
        let baseline = self.y - size_pt * PT_TO_MM;
        self.layer.use_text(text, size_pt, Mm(x_mm), Mm(baseline), &font);
        self.y -= line_height_mm(size_pt);
    }

    /// Emit a word-wrapped block; the overflow check runs per line.
    fn wrapped(&mut self, text: &str, size_pt: f64, x_mm: f64, width_mm: f64) {
        for line in wrap_text(text, max_chars(width_mm, size_pt)) {
            if line.is_empty() {
                self.gap(line_height_mm(size_pt) / 2.0);
            } else {
                self.text_line(&line, size_pt, false, x_mm);
            }
        }
    }

    /// Emit one field-table row: bold label, wrapped value column.
    fn field_row(&mut self, label: &str, value: &str) {
        let lines = wrap_text(value, max_chars(FIELD_VALUE_WIDTH_MM, BODY_SIZE));
        let height = line_height_mm(BODY_SIZE);

        self.ensure(height);
        let baseline = self.y - BODY_SIZE * PT_TO_MM;
        self.layer
            .use_text(label, BODY_SIZE, Mm(MARGIN_LEFT), Mm(baseline), &self.bold);
        if let Some(first) = lines.first() {
            self.layer.use_text(
                first,
                BODY_SIZE,
                Mm(MARGIN_LEFT + FIELD_COLUMN_MM),
                Mm(baseline),
                &self.body,
            );
        }
        self.y -= height;

        for line in lines.iter().skip(1) {
            self.text_line(line, BODY_SIZE, false, MARGIN_LEFT + FIELD_COLUMN_MM);
        }
    }

    /// Emit a section heading with breathing room, keeping the heading
    /// attached to at least one following line.
    fn section(&mut self, label: &str) {
        self.ensure(line_height_mm(HEADING_SIZE) + 2.0 * line_height_mm(BODY_SIZE));
        self.gap(3.5);
        self.text_line(label, HEADING_SIZE, true, MARGIN_LEFT);
        self.gap(1.0);
    }

    /// Thin horizontal rule across the writable width at the cursor.
    fn rule(&mut self) {
        self.layer.set_outline_thickness(0.4);
        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(0.25, 0.25, 0.25, None)));
        let line = Line {
            points: vec![
                (Point::new(Mm(MARGIN_LEFT), Mm(self.y)), false),
                (Point::new(Mm(PAGE_WIDTH - MARGIN_RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
            has_fill: false,
            has_stroke: true,
            is_clipping_path: false,
        };
        self.layer.add_shape(line);
        self.y -= 1.0;
    }

    /// Vertical whitespace; never triggers a page break by itself.
    fn gap(&mut self, mm: f64) {
        self.y -= mm;
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Embed the scan code raster at the given position and edge length.
fn embed_code(
    layer: &PdfLayerReference,
    code: &CodeImage,
    x_mm: f64,
    y_mm: f64,
    size_mm: f64,
) {
    let xobject = ImageXObject {
        width: Px(code.width as usize),
        height: Px(code.height as usize),
        color_space: ColorSpace::Greyscale,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: code.pixels.clone(),
        image_filter: None,
        clipping_bbox: None,
    };
    let image = Image::from(xobject);

    // printpdf sizes images via dpi; derive it from the requested edge.
    let dpi = code.width as f64 * 25.4 / size_mm;
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x_mm)),
            translate_y: Some(Mm(y_mm)),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
}

fn line_height_mm(size_pt: f64) -> f64 {
    size_pt * PT_TO_MM * LINE_SPACING
}

/// Estimated character capacity of a column at a given type size.
fn max_chars(width_mm: f64, size_pt: f64) -> usize {
    let char_mm = size_pt * PT_TO_MM * AVG_CHAR_WIDTH_EM;
    ((width_mm / char_mm) as usize).max(1)
}

/// Greedy word wrap. Paragraph breaks (`\n`) are preserved as empty
/// lines; words longer than a full line are hard-broken.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word;
            while word.chars().count() > max {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(max).collect();
                word = &word[head.len()..];
                lines.push(head);
            }
            if word.is_empty() {
                continue;
            }
            if current.is_empty() {
                current.push_str(word);
            } else if current.chars().count() + 1 + word.chars().count() <= max {
                current.push(' ');
                current.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderpack_shared::{Component, MaterialStatus, OrderStatus, Priority, SubTask};

    fn make_order() -> Order {
        Order {
            id: "ord-1".into(),
            order_number: Some("WO-1".into()),
            title: "Steel frame".into(),
            description: "Weld and paint a steel frame per drawing.".into(),
            client_name: "ACME GmbH".into(),
            cost_center: "CC-7".into(),
            deadline: chrono::NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            priority: Priority::Medium,
            status: OrderStatus::InProgress,
            estimated_hours: Some(8.0),
            actual_hours: None,
            assignee: None,
            notes: String::new(),
            created_at: "2026-08-01T08:00:00Z".parse().unwrap(),
            components: vec![],
            subtasks: vec![],
            documents: vec![],
            material: MaterialStatus::default(),
        }
    }

    fn pages_of(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes)
            .expect("cover must parse as PDF")
            .get_pages()
            .len()
    }

    fn all_text(bytes: &[u8]) -> String {
        let doc = lopdf::Document::load_mem(bytes).expect("cover must parse as PDF");
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages).expect("extract text")
    }

    #[test]
    fn minimal_order_fits_one_page() {
        let cover = compose(&make_order(), &CompositionOptions::default(), None).unwrap();
        assert_eq!(cover.page_count, 1);
        assert_eq!(pages_of(&cover.bytes), 1);
    }

    #[test]
    fn cover_carries_title_and_number() {
        let cover = compose(&make_order(), &CompositionOptions::default(), None).unwrap();
        let text = all_text(&cover.bytes);
        assert!(text.contains("WORK ORDER"));
        assert!(text.contains("WO-1"));
        assert!(text.contains("ACME GmbH"));
    }

    #[test]
    fn long_description_flows_onto_more_pages() {
        let mut order = make_order();
        order.description = "surface treatment and final inspection ".repeat(300);
        let cover = compose(&order, &CompositionOptions::default(), None).unwrap();
        assert!(cover.page_count >= 2, "expected pagination, got {}", cover.page_count);
        assert_eq!(pages_of(&cover.bytes), cover.page_count);
    }

    #[test]
    fn notes_section_only_when_nonempty() {
        let without = compose(&make_order(), &CompositionOptions::default(), None).unwrap();
        assert!(!all_text(&without.bytes).contains(labels::SECTION_NOTES));

        let mut order = make_order();
        order.notes = "Check anchor depth first.".into();
        let with = compose(&order, &CompositionOptions::default(), None).unwrap();
        assert!(all_text(&with.bytes).contains(labels::SECTION_NOTES));
    }

    #[test]
    fn components_section_respects_option() {
        let mut order = make_order();
        order.components = vec![Component {
            id: "cmp-1".into(),
            title: "Handrail".into(),
            description: "Three segments.".into(),
            documents: vec![],
        }];
        order.subtasks = vec![SubTask {
            id: "st-1".into(),
            title: "Cut tubes".into(),
            description: String::new(),
            estimated_hours: Some(3.0),
        }];

        let mut options = CompositionOptions::default();
        options.include_components = false;
        let hidden = compose(&order, &options, None).unwrap();
        let text = all_text(&hidden.bytes);
        assert!(!text.contains(labels::SECTION_COMPONENTS));
        // Sub-tasks render independently of the components switch.
        assert!(text.contains(labels::SECTION_SUBTASKS));

        options.include_components = true;
        let shown = compose(&order, &options, None).unwrap();
        assert!(all_text(&shown.bytes).contains(labels::SECTION_COMPONENTS));
    }

    #[test]
    fn unmapped_status_renders_literally() {
        let mut order = make_order();
        order.status = OrderStatus::Other("on_hold".into());
        order.priority = Priority::Other("urgent!".into());
        let cover = compose(&order, &CompositionOptions::default(), None).unwrap();
        let text = all_text(&cover.bytes);
        assert!(text.contains("on_hold"));
        assert!(text.contains("urgent!"));
    }

    #[test]
    fn code_image_embeds_as_xobject() {
        let image = orderpack_code::encode_payload("https://example.com/#/order/WO-1").unwrap();
        let cover =
            compose(&make_order(), &CompositionOptions::default(), Some(&image)).unwrap();
        let has_xobject = cover.bytes.windows(b"XObject".len()).any(|w| w == b"XObject");
        assert!(has_xobject, "expected an image XObject in the cover");

        // With include_code off the image must not be embedded.
        let mut options = CompositionOptions::default();
        options.include_code = false;
        let plain = compose(&make_order(), &options, Some(&image)).unwrap();
        assert!(!plain.bytes.windows(b"XObject".len()).any(|w| w == b"XObject"));
    }

    #[test]
    fn wrap_text_breaks_at_width() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn wrap_text_hard_breaks_long_words() {
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_text_preserves_paragraph_breaks() {
        let lines = wrap_text("first\n\nsecond", 20);
        assert_eq!(lines, vec!["first", "", "second"]);
    }
}
