//! Substitute error page for a document that failed to fetch or parse.
//!
//! Built natively as a one-page A4 document so a failure inside the PDF
//! toolchain that produced the cover cannot also take down the fallback.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

const PAGE_WIDTH_PT: f32 = 595.276;
const PAGE_HEIGHT_PT: f32 = 841.89;
const MARGIN_PT: f32 = 57.0;
const TITLE_SIZE: i64 = 14;
const BODY_SIZE: i64 = 11;
const BODY_LEADING_PT: f32 = 16.0;

/// Character capacity of one wrapped message line.
const WRAP_CHARS: usize = 84;

const INTRO: &str = "This attachment could not be included in the packet:";

/// Build the one-page substitute document for a failed attachment.
pub(crate) fn build(name: &str, error: &str) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => body_font,
            "F2" => bold_font,
        },
    };

    let content = Content {
        operations: page_operations(name, error),
    };
    // Encoding a fully literal op list cannot fail; fall back to an empty
    // stream rather than panicking inside the fault handler.
    let encoded = content.encode().unwrap_or_default();
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            PAGE_WIDTH_PT.into(),
            PAGE_HEIGHT_PT.into(),
        ],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

fn page_operations(name: &str, error: &str) -> Vec<Operation> {
    let top = PAGE_HEIGHT_PT - 110.0;
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F2".into(), TITLE_SIZE.into()]),
        Operation::new("Td", vec![MARGIN_PT.into(), top.into()]),
        Operation::new("Tj", vec![literal(name)]),
        Operation::new("Tf", vec!["F1".into(), BODY_SIZE.into()]),
        Operation::new("Td", vec![0_f32.into(), (-28.0_f32).into()]),
        Operation::new("Tj", vec![literal(INTRO)]),
    ];

    for line in wrap(error, WRAP_CHARS) {
        ops.push(Operation::new(
            "Td",
            vec![0_f32.into(), (-BODY_LEADING_PT).into()],
        ));
        ops.push(Operation::new("Tj", vec![literal(&line)]));
    }
    ops.push(Operation::new("ET", vec![]));

    // Rule between the document name and the message.
    let rule_y = top - 8.0;
    ops.extend([
        Operation::new("RG", vec![0.25_f32.into(), 0.25_f32.into(), 0.25_f32.into()]),
        Operation::new("w", vec![0.7_f32.into()]),
        Operation::new("m", vec![MARGIN_PT.into(), rule_y.into()]),
        Operation::new("l", vec![(PAGE_WIDTH_PT - MARGIN_PT).into(), rule_y.into()]),
        Operation::new("S", vec![]),
    ]);

    ops
}

fn literal(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| {
            let cp = c as u32;
            if cp < 0x100 { cp as u8 } else { b'?' }
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// Plain greedy wrap for the message block.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        // Hard-break pathological words (URLs in error messages).
        for chunk in word
            .chars()
            .collect::<Vec<_>>()
            .chunks(max_chars)
            .map(|c| c.iter().collect::<String>())
        {
            if current.chars().count() + chunk.chars().count() > max_chars
                && !current.is_empty()
            {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(&chunk);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
