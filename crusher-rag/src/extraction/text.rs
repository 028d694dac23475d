//! Line-oriented layout inference for plain-text and markdown files.

use crate::document::{FontWeight, Position};
use crate::extraction::{ElementKind, ExtractedContent, ExtractedMetadata, FileKind, LayoutElement};

const LINES_PER_PAGE: usize = 50;
const LINE_HEIGHT: f32 = 20.0;
const CHAR_WIDTH: f32 = 8.0;
const BODY_FONT_SIZE: f32 = 12.0;
const MAX_HEADING_LEVEL: usize = 6;

const CODE_PREFIXES: &[&str] =
    &["function ", "fn ", "pub fn ", "async fn ", "def ", "const ", "let ", "import ", "export "];

pub(crate) fn extract_text(text: &str, kind: FileKind) -> ExtractedContent {
    let mut elements = Vec::new();
    let mut in_fence = false;
    let mut line_count = 0;

    for (index, line) in text.lines().enumerate() {
        line_count = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let is_fence = trimmed.starts_with("```");
        let element_kind =
            if in_fence || is_fence { ElementKind::Code } else { classify_line(trimmed) };
        if is_fence {
            in_fence = !in_fence;
        }

        let content = match element_kind {
            ElementKind::Code => line.trim_end().to_string(),
            _ => trimmed.to_string(),
        };
        let (font_size, font_weight) = match element_kind {
            ElementKind::Heading { level } => (18.0 - 2.0 * f32::from(level), FontWeight::Bold),
            _ => (BODY_FONT_SIZE, FontWeight::Normal),
        };

        elements.push(LayoutElement {
            kind: element_kind,
            position: Position::new(
                0.0,
                index as f32 * LINE_HEIGHT,
                content.chars().count() as f32 * CHAR_WIDTH,
                LINE_HEIGHT,
            ),
            content,
            page: (index / LINES_PER_PAGE) as u32 + 1,
            font_size,
            font_weight,
        });
    }

    ExtractedContent {
        content: text.to_string(),
        total_pages: line_count.div_ceil(LINES_PER_PAGE).max(1) as u32,
        layout_elements: elements,
        metadata: ExtractedMetadata::default(),
        file_kind: kind,
    }
}

/// Infer the element kind of a trimmed, non-empty line from its leading markers.
fn classify_line(line: &str) -> ElementKind {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=MAX_HEADING_LEVEL).contains(&hashes) {
        return ElementKind::Heading { level: hashes as u8 };
    }
    if is_list_item(line) {
        return ElementKind::List;
    }
    if looks_like_code(line) {
        return ElementKind::Code;
    }
    if line.starts_with('|') {
        return ElementKind::Table;
    }
    ElementKind::Text
}

fn is_list_item(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some('-' | '*' | '+') => chars.next().is_some_and(char::is_whitespace),
        Some(c) if c.is_ascii_digit() => {
            let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
            rest.starts_with('.')
        }
        _ => false,
    }
}

fn looks_like_code(line: &str) -> bool {
    line.starts_with('`')
        || line.ends_with('{')
        || line.ends_with("};")
        || line == "}"
        || CODE_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<ElementKind> {
        extract_text(text, FileKind::Markdown).layout_elements.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn classifies_markdown_markers() {
        let text = "# Title\n## Sub\n- item\n* item\n+ item\n12. numbered\n\
                    fn main() {\n}\n| a | b |\nplain words";
        assert_eq!(
            kinds(text),
            vec![
                ElementKind::Heading { level: 1 },
                ElementKind::Heading { level: 2 },
                ElementKind::List,
                ElementKind::List,
                ElementKind::List,
                ElementKind::List,
                ElementKind::Code,
                ElementKind::Code,
                ElementKind::Table,
                ElementKind::Text,
            ]
        );
    }

    #[test]
    fn emphasis_and_rules_are_not_lists() {
        assert_eq!(kinds("**bold** text\n---"), vec![ElementKind::Text, ElementKind::Text]);
    }

    #[test]
    fn bullet_markers_need_following_whitespace() {
        assert_eq!(
            kinds("-item
-1 degrees
- item
*	tabbed"),
            vec![ElementKind::Text, ElementKind::Text, ElementKind::List, ElementKind::List]
        );
    }

    #[test]
    fn fenced_blocks_are_code() {
        let text = "```rust\nlet total = 1 + 2\nprintln!(\"{total}\")\n```\nAfter the block.";
        assert_eq!(
            kinds(text),
            vec![
                ElementKind::Code,
                ElementKind::Code,
                ElementKind::Code,
                ElementKind::Code,
                ElementKind::Text
            ]
        );
    }

    #[test]
    fn seven_hashes_is_not_a_heading() {
        assert_eq!(kinds("####### deep"), vec![ElementKind::Text]);
    }

    #[test]
    fn headings_scale_font_and_are_bold() {
        let extracted = extract_text("### Third level", FileKind::Markdown);
        let element = &extracted.layout_elements[0];
        assert_eq!(element.font_size, 12.0);
        assert_eq!(element.font_weight, FontWeight::Bold);
        assert_eq!(element.content, "### Third level");
    }

    #[test]
    fn positions_and_pages_follow_line_index() {
        let mut text = String::new();
        for i in 0..120 {
            text.push_str(&format!("line {i}\n"));
        }
        let extracted = extract_text(&text, FileKind::Text);
        assert_eq!(extracted.total_pages, 3);
        let elements = &extracted.layout_elements;
        assert_eq!(elements[0].page, 1);
        assert_eq!(elements[49].page, 1);
        assert_eq!(elements[50].page, 2);
        assert_eq!(elements[119].page, 3);
        assert_eq!(elements[10].position.y, 200.0);
        assert!(elements.windows(2).all(|w| w[0].position.y < w[1].position.y));
    }

    #[test]
    fn blank_lines_are_skipped_but_advance_position() {
        let extracted = extract_text("first\n\n\nsecond", FileKind::Text);
        assert_eq!(extracted.layout_elements.len(), 2);
        assert_eq!(extracted.layout_elements[1].position.y, 3.0 * LINE_HEIGHT);
    }

    #[test]
    fn empty_input_has_one_page_and_no_elements() {
        let extracted = extract_text("", FileKind::Text);
        assert!(extracted.layout_elements.is_empty());
        assert_eq!(extracted.total_pages, 1);
    }
}
