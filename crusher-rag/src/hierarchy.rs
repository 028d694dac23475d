//! Reconstruction of the heading tree from an ordered chunk list.

use std::collections::HashMap;

use crate::document::{DocumentChunk, DocumentHierarchy};

/// Build the section forest for `chunks`.
///
/// Each heading chunk opens a node that subsumes every following chunk until
/// a heading of equal or shallower level appears. Body chunks before the
/// first heading belong to no node.
pub fn build_hierarchy(chunks: &[DocumentChunk]) -> Vec<DocumentHierarchy> {
    let mut roots = Vec::new();
    let mut stack: Vec<DocumentHierarchy> = Vec::new();

    for chunk in chunks {
        match (chunk.is_heading(), chunk.metadata.hierarchy) {
            (true, Some(level)) => {
                while stack.last().is_some_and(|top| top.level >= level) {
                    close_top(&mut stack, &mut roots);
                }
                stack.push(DocumentHierarchy {
                    id: format!("{}_section", chunk.id),
                    level,
                    title: heading_title(&chunk.content),
                    chunk_ids: vec![chunk.id.clone()],
                    children: Vec::new(),
                });
            }
            _ => {
                if let Some(top) = stack.last_mut() {
                    top.chunk_ids.push(chunk.id.clone());
                }
            }
        }
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }
    roots
}

/// Pop the innermost open node and attach it to its parent, or to the roots.
fn close_top(stack: &mut Vec<DocumentHierarchy>, roots: &mut Vec<DocumentHierarchy>) {
    if let Some(node) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Heading text without its leading `#` markers.
fn heading_title(content: &str) -> String {
    content.trim_start_matches('#').trim().to_string()
}

/// Fill `parent` and `children` on chunks from the section tree.
///
/// Body chunks and nested headings point at the heading chunk of the section
/// that encloses them; heading chunks list what they enclose in order.
pub fn link_parents(chunks: &mut [DocumentChunk], hierarchy: &[DocumentHierarchy]) {
    let mut parents: HashMap<String, String> = HashMap::new();
    let mut children: HashMap<String, Vec<String>> = HashMap::new();

    for root in hierarchy {
        for node in root.iter() {
            let Some((heading, body)) = node.chunk_ids.split_first() else {
                continue;
            };
            let nested = node.children.iter().filter_map(|child| child.chunk_ids.first());
            let enclosed: Vec<String> = body.iter().chain(nested).cloned().collect();
            for id in &enclosed {
                parents.insert(id.clone(), heading.clone());
            }
            children.insert(heading.clone(), enclosed);
        }
    }

    for chunk in chunks.iter_mut() {
        chunk.parent = parents.remove(&chunk.id);
        chunk.children = children.remove(&chunk.id).unwrap_or_default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ChunkMetadata, ChunkRelationships, ChunkType};

    fn chunk(id: &str, content: &str, level: Option<u8>) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            content: content.to_string(),
            chunk_type: if level.is_some() { ChunkType::Heading } else { ChunkType::Text },
            metadata: ChunkMetadata { hierarchy: level, ..Default::default() },
            parent: None,
            children: Vec::new(),
            relationships: ChunkRelationships::default(),
        }
    }

    fn sample() -> Vec<DocumentChunk> {
        vec![
            chunk("c0", "Preface text.", None),
            chunk("c1", "# Title", Some(1)),
            chunk("c2", "Intro.", None),
            chunk("c3", "## Section A", Some(2)),
            chunk("c4", "A body.", None),
            chunk("c5", "### Deep", Some(3)),
            chunk("c6", "## Section B", Some(2)),
            chunk("c7", "# Appendix", Some(1)),
        ]
    }

    #[test]
    fn nests_headings_by_level() {
        let roots = build_hierarchy(&sample());
        assert_eq!(roots.len(), 2);
        let title = &roots[0];
        assert_eq!(title.title, "Title");
        assert_eq!(title.chunk_ids, vec!["c1", "c2"]);
        assert_eq!(title.children.len(), 2);
        assert_eq!(title.children[0].title, "Section A");
        assert_eq!(title.children[0].chunk_ids, vec!["c3", "c4"]);
        assert_eq!(title.children[0].children[0].title, "Deep");
        assert_eq!(title.children[1].title, "Section B");
        assert_eq!(roots[1].title, "Appendix");
        assert!(roots[1].children.is_empty());
    }

    #[test]
    fn chunks_before_first_heading_are_unattached() {
        let roots = build_hierarchy(&sample());
        let attached: Vec<&String> =
            roots.iter().flat_map(|r| r.iter()).flat_map(|n| n.chunk_ids.iter()).collect();
        assert!(!attached.iter().any(|id| id.as_str() == "c0"));
        assert_eq!(attached.len(), 7);
    }

    #[test]
    fn no_headings_means_empty_forest() {
        let chunks = vec![chunk("a", "one", None), chunk("b", "two", None)];
        assert!(build_hierarchy(&chunks).is_empty());
    }

    #[test]
    fn parents_and_children_follow_sections() {
        let mut chunks = sample();
        let roots = build_hierarchy(&chunks);
        link_parents(&mut chunks, &roots);

        assert_eq!(chunks[0].parent, None);
        assert_eq!(chunks[1].parent, None);
        assert_eq!(chunks[1].children, vec!["c2", "c3", "c6"]);
        assert_eq!(chunks[2].parent.as_deref(), Some("c1"));
        assert_eq!(chunks[3].children, vec!["c4", "c5"]);
        assert_eq!(chunks[5].parent.as_deref(), Some("c3"));
        assert!(chunks[7].children.is_empty());
    }
}
