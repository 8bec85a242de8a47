//! Per-page header stamping for merged documents.
//!
//! Every page of a successfully fetched document receives a one-line
//! header (order title, client name, order number) near the top edge and
//! a thin rule beneath it. The original page content is wrapped in a
//! save/restore pair so a document's leftover graphics state cannot
//! displace the stamp, and the stamp itself restores to the pristine
//! state before drawing.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use crate::PageHeader;

/// Resource name under which the header font is registered on each page.
const FONT_KEY: &str = "OPHdr";

/// Header type size in points.
const HEADER_SIZE: i64 = 9;

/// Horizontal page margin for the stamp, in points.
const STAMP_MARGIN_PT: f32 = 36.0;

/// Baseline offset of the header from the top edge, in points.
const HEADER_BASELINE_PT: f32 = 24.0;

/// Rule offset from the top edge, in points.
const RULE_OFFSET_PT: f32 = 30.0;

/// Fallback page size (A4, points) when no MediaBox resolves.
pub(crate) const FALLBACK_PAGE: (f32, f32) = (595.276, 841.89);

/// Stamp every page of `doc` with the order header. Returns the page
/// count. Errors are plain strings; the caller wraps them with the
/// document's display name.
pub(crate) fn stamp_document(
    doc: &mut Document,
    header: &PageHeader,
) -> std::result::Result<usize, String> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err("document has no pages".into());
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    // One shared save-state prefix; per-page stamp streams differ only via
    // page geometry.
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));

    for page_id in pages.iter().copied() {
        stamp_page(doc, page_id, header, font_id, save_id)?;
    }

    Ok(pages.len())
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    header: &PageHeader,
    font_id: ObjectId,
    save_id: ObjectId,
) -> std::result::Result<(), String> {
    let (width, height) =
        resolve_media_box(doc, page_id).unwrap_or(FALLBACK_PAGE);

    let content = Content {
        operations: header_operations(header, width, height),
    };
    let encoded = content.encode().map_err(|e| e.to_string())?;
    let stamp_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    // Materialize page-level Resources (own or inherited) with our font
    // registered, so the page survives re-parenting during the merge.
    let resources = page_resources_with_font(doc, page_id, font_id);

    let existing = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| e.to_string())?
        .get(b"Contents")
        .cloned();

    let mut contents: Vec<Object> = vec![Object::Reference(save_id)];
    match existing {
        Ok(Object::Reference(id)) => contents.push(Object::Reference(id)),
        Ok(Object::Array(items)) => contents.extend(items),
        Ok(other) => contents.push(other),
        Err(_) => {}
    }
    contents.push(Object::Reference(stamp_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| e.to_string())?;
    page.set("Contents", contents);
    page.set("Resources", Object::Dictionary(resources));

    Ok(())
}

/// Build the stamp content: restore the pristine graphics state, draw the
/// header line, then the rule.
fn header_operations(header: &PageHeader, width: f32, height: f32) -> Vec<Operation> {
    let gray: f32 = 0.25;
    vec![
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![FONT_KEY.into(), HEADER_SIZE.into()]),
        Operation::new(
            "Td",
            vec![
                STAMP_MARGIN_PT.into(),
                (height - HEADER_BASELINE_PT).into(),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(
                encode_win_ansi(&header.line()),
                StringFormat::Literal,
            )],
        ),
        Operation::new("ET", vec![]),
        Operation::new("RG", vec![gray.into(), gray.into(), gray.into()]),
        Operation::new("w", vec![0.7_f32.into()]),
        Operation::new(
            "m",
            vec![STAMP_MARGIN_PT.into(), (height - RULE_OFFSET_PT).into()],
        ),
        Operation::new(
            "l",
            vec![
                (width - STAMP_MARGIN_PT).into(),
                (height - RULE_OFFSET_PT).into(),
            ],
        ),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// The page's Resources (own or inherited), cloned, with the header font
/// registered under [`FONT_KEY`].
fn page_resources_with_font(
    doc: &Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Dictionary {
    let mut resources = resolve_in_tree(doc, page_id, b"Resources")
        .and_then(|o| o.as_dict().ok().cloned())
        .unwrap_or_else(Dictionary::new);

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|o| o.as_dict().ok().cloned())
            .unwrap_or_else(Dictionary::new),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_KEY, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

/// Resolve an attribute on a page, walking the Parent chain for
/// inheritable keys. Dereferences one level of indirection.
pub(crate) fn resolve_in_tree(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    // Bounded walk; a deeper page tree than this is not a sane document.
    for _ in 0..64 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => current = *id,
            _ => return None,
        }
    }
    None
}

/// Resolved page extent from the (possibly inherited) MediaBox.
pub(crate) fn resolve_media_box(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let media_box = resolve_in_tree(doc, page_id, b"MediaBox")?;
    let rect = media_box.as_array().ok()?;
    if rect.len() != 4 {
        return None;
    }
    let nums: Vec<f32> = rect.iter().filter_map(as_number).collect();
    if nums.len() != 4 {
        return None;
    }
    Some(((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
}

fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Lossy WinAnsi-ish encoding: Latin-1 code points pass through, anything
/// else becomes `?`. The lopdf writer escapes literal-string delimiters.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if cp < 0x100 { cp as u8 } else { b'?' }
        })
        .collect()
}
