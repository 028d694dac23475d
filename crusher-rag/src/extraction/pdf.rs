//! PDF text and layout extraction on top of `lopdf` content streams.
//!
//! Each page's content stream is walked with a minimal text/graphics state so
//! that every text-showing operator yields one [`LayoutElement`] with its
//! position, estimated extent, effective font size and weight.

use std::collections::{HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::document::{FontWeight, Position};
use crate::extraction::{ElementKind, ExtractedContent, ExtractedMetadata, FileKind, LayoutElement};

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
const DEFAULT_FONT_SIZE: f32 = 12.0;
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;
const MAX_INHERITANCE_DEPTH: usize = 16;

pub(crate) async fn extract_pdf(
    bytes: &[u8],
    extract_images: bool,
    max_pages: Option<u32>,
) -> Result<ExtractedContent, lopdf::Error> {
    let doc = Document::load_mem(bytes)?;
    let pages = doc.get_pages();
    let metadata = document_info(&doc);

    let mut elements = Vec::new();
    let mut first_error = None;
    let mut page_offset = 0.0;
    for (index, (&page_number, &page_id)) in pages.iter().enumerate() {
        if max_pages.is_some_and(|max| index as u32 >= max) {
            debug!(max_pages, total = pages.len(), "page limit reached");
            break;
        }
        let page_height = page_height(&doc, page_id);
        match extract_page(&doc, page_id, page_number, page_offset, page_height, extract_images) {
            Ok(page_elements) => elements.extend(page_elements),
            Err(e) => {
                warn!(page = page_number, error = %e, "skipping unreadable page");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        page_offset += page_height;
        tokio::task::yield_now().await;
    }

    // A document whose every readable page was empty is only an error when
    // some page failed outright.
    if let Some(e) = first_error.filter(|_| elements.is_empty()) {
        return Err(e);
    }

    let content = elements
        .iter()
        .filter(|e| e.kind != ElementKind::Image)
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(ExtractedContent {
        content,
        total_pages: pages.len() as u32,
        layout_elements: elements,
        metadata,
        file_kind: FileKind::Pdf,
    })
}

fn extract_page(
    doc: &Document,
    page_id: ObjectId,
    page_number: u32,
    page_offset: f32,
    page_height: f32,
    extract_images: bool,
) -> Result<Vec<LayoutElement>, lopdf::Error> {
    let resources = page_resources(doc, page_id);
    let fonts = resources.map(|r| font_names(doc, r)).unwrap_or_default();
    let images = match resources {
        Some(r) if extract_images => image_names(doc, r),
        _ => HashSet::new(),
    };

    let raw = doc.get_page_content(page_id)?;
    let content = Content::decode(&raw)?;
    check_complete(&raw, &content)?;
    let mut walker = PageWalker {
        page_number,
        page_offset,
        page_height,
        fonts: &fonts,
        images: &images,
        ctm: IDENTITY,
        ctm_stack: Vec::new(),
        tm: IDENTITY,
        tlm: IDENTITY,
        leading: 0.0,
        font: Vec::new(),
        font_size: DEFAULT_FONT_SIZE,
        elements: Vec::new(),
    };
    for operation in &content.operations {
        walker.apply(operation);
    }
    Ok(walker.elements)
}

/// The content parser stops at the first token it cannot read and returns
/// what it has so far. A non-empty stream that decodes to nothing, or that
/// ends inside a text object, was cut short.
fn check_complete(raw: &[u8], content: &Content) -> Result<(), lopdf::Error> {
    if content.operations.is_empty() && !raw.iter().all(u8::is_ascii_whitespace) {
        return Err(lopdf::Error::ContentDecode);
    }
    let mut open = false;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "BT" => open = true,
            "ET" => open = false,
            _ => {}
        }
    }
    if open {
        return Err(lopdf::Error::ContentDecode);
    }
    Ok(())
}

struct PageWalker<'a> {
    page_number: u32,
    page_offset: f32,
    page_height: f32,
    fonts: &'a HashMap<Vec<u8>, String>,
    images: &'a HashSet<Vec<u8>>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f32,
    font: Vec<u8>,
    font_size: f32,
    elements: Vec<LayoutElement>,
}

impl PageWalker<'_> {
    fn apply(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix(operands) {
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.font = name.clone();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.leading = leading;
                }
            }
            "Td" => self.move_line(operands),
            "TD" => {
                if let Some(ty) = operands.get(1).and_then(number) {
                    self.leading = -ty;
                }
                self.move_line(operands);
            }
            "Tm" => {
                if let Some(m) = matrix(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" | "TJ" => {
                if let Some(operand) = operands.first() {
                    self.show(operand);
                }
            }
            "'" => {
                self.next_line();
                if let Some(operand) = operands.first() {
                    self.show(operand);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(operand) = operands.get(2) {
                    self.show(operand);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    if self.images.contains(name) {
                        self.place_image(name);
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, operands: &[Object]) {
        let tx = operands.first().and_then(number).unwrap_or(0.0);
        let ty = operands.get(1).and_then(number).unwrap_or(0.0);
        self.tlm = multiply(&translation(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.tlm = multiply(&translation(0.0, -self.leading), &self.tlm);
        self.tm = self.tlm;
    }

    fn show(&mut self, operand: &Object) {
        let text = operand_text(operand);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let m = multiply(&self.tm, &self.ctm);
        let scale = (m[2] * m[2] + m[3] * m[3]).sqrt();
        let size = if scale > 0.0 { self.font_size * scale } else { self.font_size };
        let char_count = text.chars().count() as f32;
        let width = char_count * size * GLYPH_WIDTH_RATIO;

        let base_font = self.fonts.get(&self.font).map(String::as_str).unwrap_or_default();
        let font_weight = if is_bold(base_font) || is_bold(&String::from_utf8_lossy(&self.font)) {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        };

        self.elements.push(LayoutElement {
            kind: ElementKind::Text,
            content: trimmed.to_string(),
            page: self.page_number,
            position: Position::new(m[4], self.top_down(m[5]) - size, width, size),
            font_size: size,
            font_weight,
        });

        // Advance past the shown text so consecutive shows without a move do
        // not stack on the same origin.
        let advance = char_count * self.font_size * GLYPH_WIDTH_RATIO;
        self.tm = multiply(&translation(advance, 0.0), &self.tm);
    }

    fn place_image(&mut self, name: &[u8]) {
        let m = self.ctm;
        let width = m[0].abs();
        let height = m[3].abs();
        self.elements.push(LayoutElement {
            kind: ElementKind::Image,
            content: format!("[Image: {}]", String::from_utf8_lossy(name)),
            page: self.page_number,
            position: Position::new(m[4], self.top_down(m[5]) - height, width, height),
            font_size: self.font_size,
            font_weight: FontWeight::Normal,
        });
    }

    /// Convert a bottom-up page coordinate into a top-down document coordinate.
    fn top_down(&self, y: f32) -> f32 {
        self.page_offset + (self.page_height - y)
    }
}

fn translation(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn is_bold(font_name: &str) -> bool {
    let lower = font_name.to_ascii_lowercase();
    ["bold", "black", "heavy", "semibold"].iter().any(|marker| lower.contains(marker))
}

/// Decode a text-showing operand. `TJ` arrays insert a space for large
/// negative kerning adjustments, which usually separate words.
fn operand_text(operand: &Object) -> String {
    match operand {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                    Object::Integer(n) if *n < -100 => text.push(' '),
                    Object::Real(n) if (*n as f32) < -100.0 => text.push(' '),
                    _ => {}
                }
            }
            text
        }
        _ => String::new(),
    }
}

/// UTF-16BE when the byte-order mark is present, then UTF-8, then Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> =
            rest.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object)?.as_dict().ok()
}

/// Find the page's resource dictionary, following `Parent` links for
/// inherited resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    let Ok(mut node) = doc.get_dictionary(page_id) else {
        return DEFAULT_PAGE_HEIGHT;
    };
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(height) = node
            .get(b"MediaBox")
            .ok()
            .and_then(|b| resolve(doc, b))
            .and_then(|b| b.as_array().ok())
            .filter(|b| b.len() >= 4)
            .and_then(|b| Some(number(&b[3])? - number(&b[1])?))
        {
            return height.abs();
        }
        match node.get(b"Parent").ok().and_then(|p| resolve_dict(doc, p)) {
            Some(parent) => node = parent,
            None => break,
        }
    }
    DEFAULT_PAGE_HEIGHT
}

/// Map font resource names (`F1`) to their `BaseFont` names.
fn font_names(doc: &Document, resources: &Dictionary) -> HashMap<Vec<u8>, String> {
    let Some(fonts) = resources.get(b"Font").ok().and_then(|f| resolve_dict(doc, f)) else {
        return HashMap::new();
    };
    fonts
        .iter()
        .filter_map(|(name, font)| {
            let base = resolve_dict(doc, font)?.get(b"BaseFont").ok()?.as_name().ok()?;
            Some((name.clone(), String::from_utf8_lossy(base).into_owned()))
        })
        .collect()
}

/// Names of XObjects on the page whose subtype is `Image`.
fn image_names(doc: &Document, resources: &Dictionary) -> HashSet<Vec<u8>> {
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|x| resolve_dict(doc, x)) else {
        return HashSet::new();
    };
    xobjects
        .iter()
        .filter(|(_, object)| match resolve(doc, object) {
            Some(Object::Stream(stream)) => {
                let subtype = stream.dict.get(b"Subtype").ok().and_then(|s| s.as_name().ok());
                subtype == Some(b"Image".as_slice())
            }
            _ => false,
        })
        .map(|(name, _)| name.clone())
        .collect()
}

fn document_info(doc: &Document) -> ExtractedMetadata {
    let Some(info) = doc.trailer.get(b"Info").ok().and_then(|i| resolve_dict(doc, i)) else {
        return ExtractedMetadata::default();
    };
    let field = |key: &[u8]| -> Option<String> {
        match resolve(doc, info.get(key).ok()?)? {
            Object::String(bytes, _) => {
                let value = decode_pdf_string(bytes).trim().to_string();
                (!value.is_empty()).then_some(value)
            }
            _ => None,
        }
    };
    ExtractedMetadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, StringFormat};

    fn text_ops(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
            ),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    /// Build a PDF whose pages each contain the given operations, with a
    /// regular font `F1`, a bold font `F2` and an image XObject `Im1`.
    fn create_test_pdf(pages: Vec<Vec<Operation>>, title: Option<&str>) -> Vec<u8> {
        let streams = pages.into_iter().map(|operations| Content { operations }.encode().unwrap());
        create_raw_pdf(streams.collect(), title)
    }

    /// Like [`create_test_pdf`], but each page's content stream is taken
    /// as-is.
    fn create_raw_pdf(pages: Vec<Vec<u8>>, title: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let regular = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let bold = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica-Bold".to_vec())),
        ]));
        let image = doc.add_object(Stream::new(
            Dictionary::from_iter(vec![
                ("Type", Object::Name(b"XObject".to_vec())),
                ("Subtype", Object::Name(b"Image".to_vec())),
                ("Width", Object::Integer(1)),
                ("Height", Object::Integer(1)),
            ]),
            vec![0],
        ));
        let resources = doc.add_object(Dictionary::from_iter(vec![
            (
                "Font",
                Object::Dictionary(Dictionary::from_iter(vec![
                    ("F1", Object::Reference(regular)),
                    ("F2", Object::Reference(bold)),
                ])),
            ),
            (
                "XObject",
                Object::Dictionary(Dictionary::from_iter(vec![("Im1", Object::Reference(image))])),
            ),
        ]));

        let mut page_ids = Vec::new();
        for stream in pages {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), stream));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let count = page_ids.len() as i64;
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(count)),
            ("Kids", Object::Array(page_ids.into_iter().map(Object::Reference).collect())),
            ("Resources", Object::Reference(resources)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog));
        if let Some(title) = title {
            let info = doc.add_object(Dictionary::from_iter(vec![
                ("Title", Object::String(title.as_bytes().to_vec(), StringFormat::Literal)),
                ("Author", Object::String(b"Ada".to_vec(), StringFormat::Literal)),
            ]));
            doc.trailer.set("Info", Object::Reference(info));
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[tokio::test]
    async fn extracts_text_positions_fonts_and_info() {
        let mut first = text_ops("F2", 18, 72, 720, "Quarterly Report");
        first.extend(text_ops("F1", 12, 72, 690, "Revenue grew strongly."));
        let second = text_ops("F1", 12, 72, 720, "Second page text.");
        let pdf = create_test_pdf(vec![first, second], Some("Q3"));

        let extracted = extract_pdf(&pdf, false, None).await.unwrap();
        assert_eq!(extracted.total_pages, 2);
        assert_eq!(extracted.metadata.title.as_deref(), Some("Q3"));
        assert_eq!(extracted.metadata.author.as_deref(), Some("Ada"));
        assert_eq!(extracted.content, "Quarterly Report Revenue grew strongly. Second page text.");

        let elements = &extracted.layout_elements;
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].font_weight, FontWeight::Bold);
        assert_eq!(elements[0].font_size, 18.0);
        assert_eq!(elements[1].font_weight, FontWeight::Normal);
        assert_eq!(elements[0].position.x, 72.0);
        // top-down: 792 - 720 - 18
        assert_eq!(elements[0].position.y, 54.0);
        assert!(elements[0].position.y < elements[1].position.y);
        assert_eq!(elements[2].page, 2);
        assert!(elements[2].position.y > 792.0);
    }

    #[tokio::test]
    async fn respects_page_limit() {
        let pages = (0..5).map(|i| text_ops("F1", 12, 72, 700, &format!("Page {i}"))).collect();
        let pdf = create_test_pdf(pages, None);
        let extracted = extract_pdf(&pdf, false, Some(2)).await.unwrap();
        assert_eq!(extracted.total_pages, 5);
        assert_eq!(extracted.layout_elements.len(), 2);
    }

    #[tokio::test]
    async fn images_are_emitted_only_when_requested() {
        let mut ops = text_ops("F1", 12, 72, 700, "Figure below");
        ops.extend(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(200),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(72),
                    Object::Integer(500),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        let pdf = create_test_pdf(vec![ops], None);

        let without = extract_pdf(&pdf, false, None).await.unwrap();
        assert_eq!(without.layout_elements.len(), 1);

        let with = extract_pdf(&pdf, true, None).await.unwrap();
        assert_eq!(with.layout_elements.len(), 2);
        let image = &with.layout_elements[1];
        assert_eq!(image.kind, ElementKind::Image);
        assert_eq!(image.content, "[Image: Im1]");
        assert_eq!(image.position, Position::new(72.0, 192.0, 200.0, 100.0));
        assert_eq!(with.content, "Figure below");
    }

    #[tokio::test]
    async fn truncated_content_stream_is_an_error() {
        let stream = b"BT /F1 12 Tf 72 700 Td (unterminated Tj ET".to_vec();
        let pdf = create_raw_pdf(vec![stream], None);
        let result = extract_pdf(&pdf, false, None).await;
        assert!(matches!(result, Err(lopdf::Error::ContentDecode)));
    }

    #[tokio::test]
    async fn unreadable_page_is_skipped_when_others_survive() {
        let good = Content { operations: text_ops("F1", 12, 72, 700, "Still here.") };
        let pages = vec![b"BT /F1 12 Tf (cut".to_vec(), good.encode().unwrap()];
        let extracted = extract_pdf(&create_raw_pdf(pages, None), false, None).await.unwrap();
        assert_eq!(extracted.total_pages, 2);
        assert_eq!(extracted.content, "Still here.");
        assert_eq!(extracted.layout_elements[0].page, 2);
    }

    #[tokio::test]
    async fn blank_pages_are_not_errors() {
        let pdf = create_raw_pdf(vec![b" ".to_vec(), b"q Q".to_vec()], None);
        let extracted = extract_pdf(&pdf, false, None).await.unwrap();
        assert!(extracted.layout_elements.is_empty());
        assert_eq!(extracted.total_pages, 2);
    }

    #[test]
    fn tj_arrays_insert_word_gaps() {
        let operand = Object::Array(vec![
            Object::String(b"Hello".to_vec(), StringFormat::Literal),
            Object::Integer(-250),
            Object::String(b"world".to_vec(), StringFormat::Literal),
            Object::Integer(-20),
            Object::String(b"!".to_vec(), StringFormat::Literal),
        ]);
        assert_eq!(operand_text(&operand), "Hello world!");
    }

    #[test]
    fn decodes_utf16_and_latin1_strings() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_pdf_string(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn invalid_bytes_fail_to_load() {
        let result = Document::load_mem(b"definitely not a pdf");
        assert!(result.is_err());
    }
}
