//! # Table of Contents
//!
//! Legal document bodies are plain text with `#` heading markers
//! (`#` through `######`). This module splits a body into blocks, derives
//! stable section anchors for headings, nests them into a table of contents
//! and extracts a short summary for page metadata.
//!
//! Anchors have the form `section-{index}-{slug}` where `index` is the
//! zero-based position of the heading in the document. The index keeps
//! anchors unique even when two headings share a title.
//!
//! Lines inside fenced code blocks (```` ``` ```` or `~~~`) are never
//! treated as headings.

use serde::{Deserialize, Serialize};

/// A heading found in a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading depth, 1 to 6.
    pub level: u8,
    /// Heading text without the `#` markers.
    pub title: String,
    /// Anchor id used both in the rendered page and the table of contents.
    pub anchor: String,
}

/// One entry in a nested table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Anchor id of the section.
    pub id: String,
    /// Section title.
    pub title: String,
    /// Heading depth, 1 to 6.
    pub level: u8,
    /// Subsections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    /// Number of entries in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TocEntry::count).sum::<usize>()
    }
}

/// A rendered unit of a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A section heading.
    Heading(Heading),
    /// Consecutive text lines, joined with single spaces.
    Paragraph(String),
    /// Consecutive `- ` or `* ` list items.
    List(Vec<String>),
    /// Verbatim content of a fenced code block.
    Code(String),
}

/// Split `body` into blocks.
pub fn parse_blocks(body: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut list: Vec<String> = Vec::new();
    let mut code: Option<Vec<&str>> = None;
    let mut heading_index = 0usize;

    for line in body.lines() {
        let trimmed = line.trim();

        if let Some(lines) = code.as_mut() {
            if is_fence(trimmed) {
                blocks.push(Block::Code(lines.join("\n")));
                code = None;
            } else {
                lines.push(line);
            }
            continue;
        }

        if is_fence(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_list(&mut list, &mut blocks);
            code = Some(Vec::new());
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_list(&mut list, &mut blocks);
            continue;
        }

        if let Some((level, title)) = parse_heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut blocks);
            flush_list(&mut list, &mut blocks);
            blocks.push(Block::Heading(Heading {
                level,
                anchor: section_anchor(heading_index, title),
                title: title.to_string(),
            }));
            heading_index += 1;
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            flush_paragraph(&mut paragraph, &mut blocks);
            list.push(item.trim().to_string());
            continue;
        }

        flush_list(&mut list, &mut blocks);
        paragraph.push(trimmed);
    }

    // An unterminated fence runs to the end of the document.
    if let Some(lines) = code {
        blocks.push(Block::Code(lines.join("\n")));
    }
    flush_paragraph(&mut paragraph, &mut blocks);
    flush_list(&mut list, &mut blocks);
    blocks
}

fn flush_paragraph(lines: &mut Vec<&str>, blocks: &mut Vec<Block>) {
    if !lines.is_empty() {
        blocks.push(Block::Paragraph(lines.join(" ")));
        lines.clear();
    }
}

fn flush_list(items: &mut Vec<String>, blocks: &mut Vec<Block>) {
    if !items.is_empty() {
        blocks.push(Block::List(std::mem::take(items)));
    }
}

fn is_fence(trimmed: &str) -> bool {
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Recognize `#{1,6} Title`. The closing `#` sequence, if any, is dropped.
fn parse_heading(trimmed: &str) -> Option<(u8, &str)> {
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim_end();
    if title.is_empty() {
        return None;
    }
    Some((level as u8, title))
}

/// All headings in `body`, in document order.
pub fn headings(body: &str) -> Vec<Heading> {
    parse_blocks(body)
        .into_iter()
        .filter_map(|block| match block {
            Block::Heading(h) => Some(h),
            _ => None,
        })
        .collect()
}

/// Nested table of contents. A heading becomes a child of the nearest
/// preceding heading with a smaller level.
pub fn table_of_contents(body: &str) -> Vec<TocEntry> {
    let mut roots: Vec<TocEntry> = Vec::new();
    let mut open: Vec<TocEntry> = Vec::new();

    for heading in headings(body) {
        while open.last().is_some_and(|top| top.level >= heading.level) {
            if let Some(done) = open.pop() {
                attach(done, &mut open, &mut roots);
            }
        }
        open.push(TocEntry {
            id: heading.anchor,
            title: heading.title,
            level: heading.level,
            children: Vec::new(),
        });
    }
    while let Some(done) = open.pop() {
        attach(done, &mut open, &mut roots);
    }
    roots
}

fn attach(entry: TocEntry, open: &mut [TocEntry], roots: &mut Vec<TocEntry>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(entry),
        None => roots.push(entry),
    }
}

/// Anchor id for the heading at `index` titled `title`.
pub fn section_anchor(index: usize, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("section-{index}")
    } else {
        format!("section-{index}-{slug}")
    }
}

/// Lowercase ASCII slug. Latin accents are folded (`Política` becomes
/// `politica`), whitespace becomes `-`, anything else is dropped and runs
/// of `-` collapse to one.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// First paragraph (or list) of `body` with whitespace collapsed,
/// truncated to `max_chars` characters. Empty when the body has no text.
pub fn summary(body: &str, max_chars: usize) -> String {
    let text = parse_blocks(body).into_iter().find_map(|block| match block {
        Block::Paragraph(p) => Some(p),
        Block::List(items) => Some(items.join(" ")),
        _ => None,
    });
    let Some(text) = text else {
        return String::new();
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BODY: &str = "\
# Política de Privacidad

Intro paragraph that explains
who we are.

## Datos que recogemos

- Nombre
- Email

### Cookies analíticas

Texto.

## Derechos

```
# not a heading
```

# Contacto
";

    #[test]
    fn headings_skip_fenced_code() {
        let hs = headings(BODY);
        let titles: Vec<&str> = hs.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Política de Privacidad",
                "Datos que recogemos",
                "Cookies analíticas",
                "Derechos",
                "Contacto"
            ]
        );
    }

    #[test]
    fn anchors_use_index_and_folded_slug() {
        let hs = headings(BODY);
        assert_eq!(hs[0].anchor, "section-0-politica-de-privacidad");
        assert_eq!(hs[2].anchor, "section-2-cookies-analiticas");
    }

    #[test]
    fn toc_nests_by_level() {
        let toc = table_of_contents(BODY);
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "Política de Privacidad");
        assert_eq!(toc[0].children.len(), 2);
        assert_eq!(toc[0].children[0].children[0].title, "Cookies analíticas");
        assert_eq!(toc[1].title, "Contacto");
        assert!(toc[1].children.is_empty());
    }

    #[test]
    fn toc_handles_skipped_levels_and_leading_subheading() {
        let toc = table_of_contents("### Deep\n# Top\n### Skipped two\n## Back up");
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].title, "Deep");
        assert_eq!(toc[1].children.len(), 2);
    }

    #[test]
    fn hash_without_space_is_not_heading() {
        assert!(headings("#hashtag\n####### seven").is_empty());
    }

    #[test]
    fn closing_hashes_are_dropped() {
        let hs = headings("## Title ##");
        assert_eq!(hs[0].title, "Title");
    }

    #[test]
    fn duplicate_titles_get_distinct_anchors() {
        let hs = headings("# Same\n# Same");
        assert_ne!(hs[0].anchor, hs[1].anchor);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Hello -- World! "), "hello-world");
        assert_eq!(slugify("Año 2024: Cambios"), "ano-2024-cambios");
        assert_eq!(slugify("¿?"), "");
        assert_eq!(section_anchor(4, "¿?"), "section-4");
    }

    #[test]
    fn blocks_group_paragraphs_and_lists() {
        let blocks = parse_blocks(BODY);
        assert_eq!(
            blocks[1],
            Block::Paragraph("Intro paragraph that explains who we are.".into())
        );
        assert_eq!(blocks[3], Block::List(vec!["Nombre".into(), "Email".into()]));
        assert!(blocks.contains(&Block::Code("# not a heading".into())));
    }

    #[test]
    fn summary_uses_first_paragraph_and_truncates() {
        assert_eq!(summary(BODY, 15), "Intro paragraph");
        assert_eq!(summary(BODY, 15).chars().count(), 15);
        assert_eq!(summary("# Only heading", 160), "");
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let s = summary("ñññññ", 3);
        assert_eq!(s, "ñññ");
    }

    fn flatten(entries: &[TocEntry], out: &mut Vec<String>) {
        for e in entries {
            out.push(e.id.clone());
            flatten(&e.children, out);
        }
    }

    proptest! {
        #[test]
        fn toc_covers_every_heading_once(
            lines in proptest::collection::vec((1u8..=6, "[A-Za-z ]{1,12}"), 0..25)
        ) {
            let body: String = lines
                .iter()
                .map(|(level, title)| format!("{} x{}\n", "#".repeat(*level as usize), title))
                .collect();
            let toc = table_of_contents(&body);
            let mut ids = Vec::new();
            flatten(&toc, &mut ids);
            prop_assert_eq!(ids.len(), lines.len());
            let total: usize = toc.iter().map(TocEntry::count).sum();
            prop_assert_eq!(total, lines.len());
            let unique: std::collections::HashSet<_> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len());
        }

        #[test]
        fn children_are_deeper_than_parents(
            levels in proptest::collection::vec(1u8..=6, 1..20)
        ) {
            let body: String = levels
                .iter()
                .enumerate()
                .map(|(i, l)| format!("{} h{i}\n", "#".repeat(*l as usize)))
                .collect();
            fn check(entries: &[TocEntry]) -> bool {
                entries.iter().all(|e| e.children.iter().all(|c| c.level > e.level) && check(&e.children))
            }
            prop_assert!(check(&table_of_contents(&body)));
        }
    }
}
